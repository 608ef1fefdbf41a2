//! Income bracket lookup
//!
//! Brackets are deployment policy. The table is an ordered list of lower
//! bounds; each bracket runs up to the next bound and the last one is
//! unbounded above.

use crate::error::{RegistryError, Result};
use crate::models::{Centavos, IncomeClass};
use serde::{Deserialize, Serialize};
use std::fmt;

/// PSA poverty threshold for a family of five, 2021 (monthly, pesos)
pub const DEFAULT_POVERTY_LINE_PESOS: i64 = 12_030;

/// One bracket: incomes at or above `lower_bound` fall into `class`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeBracket {
    pub class: IncomeClass,
    pub lower_bound: Centavos,
}

/// Ordered, non-overlapping income bracket table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<IncomeBracket>", into = "Vec<IncomeBracket>")]
pub struct IncomeBracketTable {
    brackets: Vec<IncomeBracket>,
}

impl IncomeBracketTable {
    /// Build a table, checking ordering and coverage
    ///
    /// The first bracket must start at zero; lower bounds and classes must both
    /// be strictly increasing.
    pub fn new(brackets: Vec<IncomeBracket>) -> Result<Self> {
        let Some(first) = brackets.first() else {
            return Err(RegistryError::Config(
                "income bracket table is empty".to_string(),
            ));
        };
        if first.lower_bound != Centavos::ZERO {
            return Err(RegistryError::Config(format!(
                "lowest income bracket must start at 0, got {}",
                first.lower_bound
            )));
        }
        for pair in brackets.windows(2) {
            if pair[1].lower_bound <= pair[0].lower_bound {
                return Err(RegistryError::Config(format!(
                    "income bracket bounds must increase: {} follows {}",
                    pair[1].lower_bound, pair[0].lower_bound
                )));
            }
            if pair[1].class <= pair[0].class {
                return Err(RegistryError::Config(format!(
                    "income classes must increase: {} follows {}",
                    pair[1].class, pair[0].class
                )));
            }
        }
        Ok(Self { brackets })
    }

    /// Seven-class table expressed as multiples of a poverty line
    ///
    /// Poor below 1x, low income 1-2x, lower middle 2-4x, middle 4-7x,
    /// upper middle 7-12x, upper income 12-20x, rich 20x and above. The line
    /// must be positive and small enough that every multiple is distinct.
    pub fn from_poverty_line(poverty_line: Centavos) -> Result<Self> {
        if poverty_line <= Centavos::ZERO {
            return Err(RegistryError::Config(format!(
                "poverty line must be positive, got {poverty_line}"
            )));
        }
        Self::new(poverty_line_brackets(poverty_line))
    }

    /// Bracket containing `income`
    ///
    /// Incomes below the first bound (only possible for negative input, which
    /// is rejected upstream) fall into the lowest bracket.
    #[must_use]
    pub fn classify(&self, income: Centavos) -> IncomeClass {
        let idx = self
            .brackets
            .partition_point(|bracket| bracket.lower_bound <= income);
        self.brackets[idx.saturating_sub(1)].class
    }

    #[must_use]
    pub fn brackets(&self) -> &[IncomeBracket] {
        &self.brackets
    }
}

fn poverty_line_brackets(poverty_line: Centavos) -> Vec<IncomeBracket> {
    const MULTIPLES: [i64; 7] = [0, 1, 2, 4, 7, 12, 20];
    IncomeClass::ALL
        .iter()
        .zip(MULTIPLES)
        .map(|(class, multiple)| IncomeBracket {
            class: *class,
            lower_bound: Centavos(poverty_line.value().saturating_mul(multiple)),
        })
        .collect()
}

impl Default for IncomeBracketTable {
    fn default() -> Self {
        // A positive constant line always yields a valid table
        Self {
            brackets: poverty_line_brackets(Centavos::from_pesos(DEFAULT_POVERTY_LINE_PESOS)),
        }
    }
}

impl TryFrom<Vec<IncomeBracket>> for IncomeBracketTable {
    type Error = RegistryError;

    fn try_from(brackets: Vec<IncomeBracket>) -> Result<Self> {
        Self::new(brackets)
    }
}

impl From<IncomeBracketTable> for Vec<IncomeBracket> {
    fn from(table: IncomeBracketTable) -> Self {
        table.brackets
    }
}

impl fmt::Display for IncomeBracketTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, bracket) in self.brackets.iter().enumerate() {
            match self.brackets.get(i + 1) {
                Some(next) => writeln!(
                    f,
                    "    {}: {} to below {}",
                    bracket.class, bracket.lower_bound, next.lower_bound
                )?,
                None => writeln!(f, "    {}: {} and above", bracket.class, bracket.lower_bound)?,
            }
        }
        Ok(())
    }
}
