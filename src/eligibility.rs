//! # Eligibility check
//! Pure logic that maps `(income, family size, AMI band, year)` over a set
//! of validated income-limit rows to an eligibility verdict. No I/O;
//! callers acquire the rows first (fresh or stale) and evaluate here.

use serde::Serialize;

use crate::model::{AmiCategory, IncomeLimitRow};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EligibilityResult {
    pub eligible: bool,
    pub annual_income: f64,
    pub income_limit: Option<f64>,
    pub ami_category: AmiCategory,
    pub year: i32,
    pub family_size: u8,
    /// Income as a percentage of the applicable limit, when one exists.
    pub percentage_of_limit: Option<f64>,
    /// Max affordable rent for the band, only reported when eligible.
    pub max_affordable_rent: Option<f64>,
    pub reason: String,
}

pub fn check_eligibility(
    rows: &[IncomeLimitRow],
    annual_income: f64,
    family_size: u8,
    ami_category: AmiCategory,
    year: i32,
) -> EligibilityResult {
    let ineligible = |reason: String, limit: Option<f64>| EligibilityResult {
        eligible: false,
        annual_income,
        income_limit: limit,
        ami_category,
        year,
        family_size,
        percentage_of_limit: limit.map(|l| percentage(annual_income, l)),
        max_affordable_rent: None,
        reason,
    };

    let Some(row) = rows
        .iter()
        .find(|r| r.year == year && r.family_size == family_size)
    else {
        return ineligible(
            format!("No income limits found for a {family_size}-person household in {year}"),
            None,
        );
    };

    let Some(limit) = row.ami_limit(ami_category) else {
        return ineligible(
            format!("Income limit not available for the {ami_category} AMI band in {year}"),
            None,
        );
    };

    if annual_income > limit {
        return ineligible(
            format!(
                "Income ${annual_income:.2} exceeds the {ami_category} AMI limit of ${limit:.2}"
            ),
            Some(limit),
        );
    }

    EligibilityResult {
        eligible: true,
        annual_income,
        income_limit: Some(limit),
        ami_category,
        year,
        family_size,
        percentage_of_limit: Some(percentage(annual_income, limit)),
        max_affordable_rent: row.max_rent(ami_category),
        reason: format!(
            "Income ${annual_income:.2} is within the {ami_category} AMI limit of ${limit:.2}"
        ),
    }
}

fn percentage(income: f64, limit: f64) -> f64 {
    if limit > 0.0 {
        income / limit * 100.0
    } else {
        0.0
    }
}
