//! Tiered relevance scoring.
//!
//! Every (field, term) pair is compared case-insensitively and lands in one
//! of four tiers: exact, prefix, contains or none. The tier is weighted by
//! the class of the field name, so a product match outranks a company match,
//! which outranks a match anywhere else. A record's score is the sum over
//! all requested fields and all terms.

use std::{fmt, str::FromStr};

use crate::{
    error::{Error, Result},
    model::Row,
};

/// Normalized field names that score as products.
const PRODUCT_FIELDS: &[&str] = &["product"];
/// Normalized field names that score as companies.
const COMPANY_FIELDS: &[&str] = &["company", "indiancompany", "foreigncompany"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    Exact,
    Prefix,
    Contains,
    None,
}

/// Compare a stored value with a search term, ignoring case.
pub fn match_tier(value: &str, term: &str) -> MatchTier {
    let value = value.to_lowercase();
    let term = term.to_lowercase();

    if value == term {
        MatchTier::Exact
    } else if value.starts_with(&term) {
        MatchTier::Prefix
    } else if value.contains(&term) {
        MatchTier::Contains
    } else {
        MatchTier::None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldClass {
    Product,
    Company,
    Other,
}

impl FieldClass {
    /// Classify a field name, ignoring case, spaces and underscores, so
    /// `Indian Company` and `indian_company` are both companies.
    pub fn of(field: &str) -> Self {
        let normalized: String = field
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_')
            .flat_map(char::to_lowercase)
            .collect();

        if PRODUCT_FIELDS.contains(&normalized.as_str()) {
            Self::Product
        } else if COMPANY_FIELDS.contains(&normalized.as_str()) {
            Self::Company
        } else {
            Self::Other
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierWeights {
    pub exact: u32,
    pub prefix: u32,
    pub contains: u32,
}

impl TierWeights {
    pub const fn new(exact: u32, prefix: u32, contains: u32) -> Self {
        Self {
            exact,
            prefix,
            contains,
        }
    }

    fn get(&self, tier: MatchTier) -> u32 {
        match tier {
            MatchTier::Exact => self.exact,
            MatchTier::Prefix => self.prefix,
            MatchTier::Contains => self.contains,
            MatchTier::None => 0,
        }
    }

    fn is_strictly_ordered(&self) -> bool {
        self.exact > self.prefix && self.prefix > self.contains && self.contains > 0
    }
}

/// Score per field class and match tier.
///
/// Stored as a setting in the form `"200,150,100,150,100,50,30,20,10"`:
/// product, company and other weights, each as exact/prefix/contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightTable {
    pub product: TierWeights,
    pub company: TierWeights,
    pub other: TierWeights,
}

impl Default for WeightTable {
    fn default() -> Self {
        Self {
            product: TierWeights::new(200, 150, 100),
            company: TierWeights::new(150, 100, 50),
            other: TierWeights::new(30, 20, 10),
        }
    }
}

impl WeightTable {
    pub fn weight(&self, class: FieldClass, tier: MatchTier) -> u32 {
        match class {
            FieldClass::Product => self.product.get(tier),
            FieldClass::Company => self.company.get(tier),
            FieldClass::Other => self.other.get(tier),
        }
    }

    /// Check the ordering rules every table must satisfy:
    /// - exact > prefix > contains > 0 within each class,
    /// - product > company > other within each tier,
    /// - the weakest company match beats the strongest other match.
    pub fn validate(&self) -> Result<()> {
        for (name, tiers) in [
            ("product", self.product),
            ("company", self.company),
            ("other", self.other),
        ] {
            if !tiers.is_strictly_ordered() {
                return Err(Error::Config(format!(
                    "{name} weights must satisfy exact > prefix > contains > 0"
                )));
            }
        }

        for tier in [MatchTier::Exact, MatchTier::Prefix, MatchTier::Contains] {
            let product = self.product.get(tier);
            let company = self.company.get(tier);
            let other = self.other.get(tier);
            if !(product > company && company > other) {
                return Err(Error::Config(format!(
                    "{tier:?} weights must satisfy product > company > other"
                )));
            }
        }

        if self.company.contains <= self.other.exact {
            return Err(Error::Config(
                "company contains weight must exceed other exact weight".into(),
            ));
        }

        Ok(())
    }
}

impl fmt::Display for WeightTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values = [self.product, self.company, self.other]
            .iter()
            .flat_map(|t| [t.exact, t.prefix, t.contains])
            .map(|w| w.to_string())
            .collect::<Vec<_>>();
        f.write_str(&values.join(","))
    }
}

impl FromStr for WeightTable {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let values = s
            .split(',')
            .map(|part| {
                part.trim().parse::<u32>().map_err(|e| {
                    Error::Config(format!("invalid weight '{}': {e}", part.trim()))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let &[pe, pp, pc, ce, cp, cc, oe, op, oc] = values.as_slice() else {
            return Err(Error::Config(format!(
                "expected 9 comma-separated weights, got {}",
                values.len()
            )));
        };

        let table = Self {
            product: TierWeights::new(pe, pp, pc),
            company: TierWeights::new(ce, cp, cc),
            other: TierWeights::new(oe, op, oc),
        };
        table.validate()?;
        Ok(table)
    }
}

/// Score one term against the requested fields of a record.
///
/// Missing fields, empty values and blank terms contribute nothing.
pub fn score(
    record: &Row,
    fields: &[String],
    term: &str,
    weights: &WeightTable,
) -> u32 {
    let term = term.trim();
    if term.is_empty() {
        return 0;
    }

    fields
        .iter()
        .filter_map(|field| {
            let value = record.get(field.trim())?;
            if value.is_empty() {
                return None;
            }
            let tier = match_tier(value, term);
            Some(weights.weight(FieldClass::of(field), tier))
        })
        .fold(0, u32::saturating_add)
}

/// Sum of [`score`] over every term.
///
/// Both sums saturate at `u32::MAX` instead of wrapping.
pub fn score_terms(
    record: &Row,
    fields: &[String],
    terms: &[String],
    weights: &WeightTable,
) -> u32 {
    terms
        .iter()
        .map(|term| score(record, fields, term, weights))
        .fold(0, u32::saturating_add)
}
