use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use super::model::{
    Dataset, Record, FIELD_BUDGET_TYPE, FIELD_DEPARTMENT, FIELD_FISCAL_YEAR, FIELD_PROJECT,
};

/// Option value meaning "no filter on this dimension".
pub const ALL: &str = "ทั้งหมด";

/// Distinct values offered for one dimension, always headed by [`ALL`].
pub type OptionList = Vec<String>;

// ---------------------------------------------------------------------------
// Dimensions, in cascade order
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    BudgetType,
    FiscalYear,
    Project,
    Department,
}

impl Dimension {
    /// Left-to-right evaluation order of the cascade.
    pub const ORDER: [Dimension; 4] = [
        Dimension::BudgetType,
        Dimension::FiscalYear,
        Dimension::Project,
        Dimension::Department,
    ];

    pub fn field(self) -> &'static str {
        match self {
            Dimension::BudgetType => FIELD_BUDGET_TYPE,
            Dimension::FiscalYear => FIELD_FISCAL_YEAR,
            Dimension::Project => FIELD_PROJECT,
            Dimension::Department => FIELD_DEPARTMENT,
        }
    }

    /// Dimensions evaluated before `self`.
    pub fn upstream(self) -> impl Iterator<Item = Dimension> {
        Self::ORDER.into_iter().take_while(move |d| *d != self)
    }
}

// ---------------------------------------------------------------------------
// Selection state
// ---------------------------------------------------------------------------

/// The user's current choice on each dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSelection {
    pub budget_type: String,
    pub fiscal_year: String,
    pub project: String,
    pub departments: Vec<String>,
}

impl Default for FilterSelection {
    fn default() -> Self {
        Self {
            budget_type: ALL.to_string(),
            fiscal_year: ALL.to_string(),
            project: ALL.to_string(),
            departments: vec![ALL.to_string()],
        }
    }
}

impl FilterSelection {
    /// Whether `record` passes the predicate of a single dimension.
    ///
    /// Single-value dimensions compare the field's text to the chosen value;
    /// the department dimension tests set membership. "All" (and an empty
    /// department set) always passes.
    pub fn matches(&self, dim: Dimension, record: &Record) -> bool {
        let chosen = match dim {
            Dimension::BudgetType => &self.budget_type,
            Dimension::FiscalYear => &self.fiscal_year,
            Dimension::Project => &self.project,
            Dimension::Department => {
                if !self.departments_active() {
                    return true;
                }
                let value = record.text(dim.field());
                return self.departments.iter().any(|d| *d == value);
            }
        };
        chosen == ALL || record.text(dim.field()) == *chosen
    }

    /// Whether `record` passes every dimension (logical AND).
    pub fn matches_all(&self, record: &Record) -> bool {
        Dimension::ORDER.iter().all(|d| self.matches(*d, record))
    }

    /// The department dimension filters only when the set is non-empty and
    /// does not contain [`ALL`].
    pub fn departments_active(&self) -> bool {
        !self.departments.is_empty() && !self.departments.iter().any(|d| d == ALL)
    }

    pub fn single_mut(&mut self, dim: Dimension) -> Option<&mut String> {
        match dim {
            Dimension::BudgetType => Some(&mut self.budget_type),
            Dimension::FiscalYear => Some(&mut self.fiscal_year),
            Dimension::Project => Some(&mut self.project),
            Dimension::Department => None,
        }
    }

    /// Tick or untick one department in the multi-select.
    ///
    /// Ticking [`ALL`] clears specific choices; ticking a specific value
    /// clears [`ALL`].
    pub fn toggle_department(&mut self, value: &str) {
        if let Some(pos) = self.departments.iter().position(|d| d == value) {
            self.departments.remove(pos);
        } else if value == ALL {
            self.departments = vec![ALL.to_string()];
        } else {
            self.departments.retain(|d| d != ALL);
            self.departments.push(value.to_string());
        }
    }
}

// ---------------------------------------------------------------------------
// Option derivation
// ---------------------------------------------------------------------------

/// Options for `dim`, narrowed only by the dimensions to its left.
pub fn derive_options(dataset: &Dataset, dim: Dimension, selection: &FilterSelection) -> OptionList {
    let upstream = dataset
        .records
        .iter()
        .filter(|r| dim.upstream().all(|d| selection.matches(d, r)));
    option_list(dim, upstream)
}

fn option_list<'a>(dim: Dimension, records: impl Iterator<Item = &'a Record>) -> OptionList {
    let field = dim.field();
    let mut seen = HashSet::new();
    let mut values: Vec<String> = Vec::new();
    for record in records {
        match record.get(field) {
            Some(v) if !v.is_empty() => {
                let text = v.to_text();
                if seen.insert(text.clone()) {
                    values.push(text);
                }
            }
            _ => {}
        }
    }

    match dim {
        // stable: ties keep first-occurrence order
        Dimension::Department => values.sort_by_key(|v| match leading_number(v) {
            Some(n) => (0u8, n),
            None => (1u8, 0),
        }),
        _ => values.sort(),
    }

    let mut options = Vec::with_capacity(values.len() + 1);
    options.push(ALL.to_string());
    options.extend(values);
    options
}

static DIGIT_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

/// Numeric value of the first run of decimal digits (any script) in `s`.
pub fn leading_number(s: &str) -> Option<u128> {
    let run = DIGIT_RUN.find(s)?;
    let mut n: u128 = 0;
    for c in run.as_str().chars() {
        n = n.saturating_mul(10).saturating_add(digit_value(c) as u128);
    }
    Some(n)
}

/// Value of a Unicode decimal digit.
///
/// Decimal digits are assigned in contiguous 0..=9 blocks, so the value is
/// the distance from the start of the block run modulo ten.
fn digit_value(c: char) -> u32 {
    if let Some(d) = c.to_digit(10) {
        return d;
    }
    let mut buf = [0u8; 4];
    let mut start = c as u32;
    while let Some(prev) = start.checked_sub(1).and_then(char::from_u32) {
        if !DIGIT_RUN.is_match(prev.encode_utf8(&mut buf)) {
            break;
        }
        start -= 1;
    }
    (c as u32 - start) % 10
}

// ---------------------------------------------------------------------------
// Selection reconciliation
// ---------------------------------------------------------------------------

/// A single-value choice survives only while it is still offered.
pub fn reconcile_single(chosen: &str, options: &OptionList) -> String {
    if options.iter().any(|o| o == chosen) {
        chosen.to_string()
    } else {
        ALL.to_string()
    }
}

/// Keep the department choices still offered; collapse to `[ALL]` if none are.
pub fn reconcile_departments(chosen: &[String], options: &OptionList) -> Vec<String> {
    let valid: Vec<String> = chosen
        .iter()
        .filter(|d| options.contains(d))
        .cloned()
        .collect();
    if valid.is_empty() {
        vec![ALL.to_string()]
    } else {
        valid
    }
}

// ---------------------------------------------------------------------------
// Full cascade pass
// ---------------------------------------------------------------------------

/// Option lists for every dimension plus the selection they were reconciled to.
#[derive(Debug, Clone, PartialEq)]
pub struct CascadeView {
    pub budget_types: OptionList,
    pub fiscal_years: OptionList,
    pub projects: OptionList,
    pub departments: OptionList,
    pub selection: FilterSelection,
}

impl CascadeView {
    pub fn options(&self, dim: Dimension) -> &OptionList {
        match dim {
            Dimension::BudgetType => &self.budget_types,
            Dimension::FiscalYear => &self.fiscal_years,
            Dimension::Project => &self.projects,
            Dimension::Department => &self.departments,
        }
    }
}

/// Run the left-to-right cascade once.
///
/// Each dimension's options come from the rows left by the dimensions before
/// it; its choice is reconciled against those options before narrowing the
/// rows for the next dimension.
pub fn cascade(dataset: &Dataset, selection: &FilterSelection) -> CascadeView {
    let mut sel = selection.clone();
    let mut rows: Vec<&Record> = dataset.records.iter().collect();
    let mut lists: Vec<OptionList> = Vec::with_capacity(Dimension::ORDER.len());

    for dim in Dimension::ORDER {
        let options = option_list(dim, rows.iter().copied());
        match sel.single_mut(dim) {
            Some(chosen) => *chosen = reconcile_single(chosen, &options),
            None => sel.departments = reconcile_departments(&sel.departments, &options),
        }
        rows.retain(|r| sel.matches(dim, r));
        lists.push(options);
    }

    let mut lists = lists.into_iter();
    let mut next = || lists.next().unwrap_or_else(|| vec![ALL.to_string()]);
    CascadeView {
        budget_types: next(),
        fiscal_years: next(),
        projects: next(),
        departments: next(),
        selection: sel,
    }
}

// ---------------------------------------------------------------------------
// Row filtering
// ---------------------------------------------------------------------------

/// Indices of records passing every active dimension, in dataset order.
pub fn apply_filters(dataset: &Dataset, selection: &FilterSelection) -> Vec<usize> {
    dataset
        .records
        .iter()
        .enumerate()
        .filter(|(_, r)| selection.matches_all(r))
        .map(|(i, _)| i)
        .collect()
}

/// [`apply_filters`] materialized as a dataset.
pub fn filter_dataset(dataset: &Dataset, selection: &FilterSelection) -> Dataset {
    dataset.select(&apply_filters(dataset, selection))
}
