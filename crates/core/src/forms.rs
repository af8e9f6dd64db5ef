//! Text-in form state for the mutating operations.
//!
//! Inputs arrive as raw strings from whatever surface collects them. Numeric
//! fields are coerced leniently: the longest numeric prefix is used, and
//! anything unparseable or negative counts as zero. A number too large for
//! `Decimal` is refused rather than coerced.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::job::{Job, JobId, JobStatus, BUDGET_NEGATIVE};
use crate::domain::payment::CostBreakdown;
use crate::errors::DomainError;
use crate::identity::ActorId;

pub const PAYMENT_TITLE_REQUIRED: &str = "Please provide a payment request title";
pub const JOB_REQUIRED: &str = "No job selected";
pub const REQUIRED_FIELDS_MISSING: &str = "Please fill in all required fields";
pub const AMOUNT_TOO_LARGE: &str = "Amount is too large";

pub fn parse_amount(raw: &str) -> Result<Decimal, DomainError> {
    match numeric_prefix(raw) {
        Some((false, literal)) => to_decimal(&literal),
        Some((true, _)) | None => Ok(Decimal::ZERO),
    }
}

/// Like [`parse_amount`], but a negative number is an error rather than zero.
pub fn parse_budget(raw: &str) -> Result<Decimal, DomainError> {
    match numeric_prefix(raw) {
        Some((false, literal)) => to_decimal(&literal),
        Some((true, literal)) if literal.bytes().any(|b| matches!(b, b'1'..=b'9')) => {
            Err(DomainError::Validation(BUDGET_NEGATIVE.to_string()))
        }
        Some((true, _)) | None => Ok(Decimal::ZERO),
    }
}

/// Splits off the leading number as `(negative, "int.frac")`, or `None` when there is none.
fn numeric_prefix(raw: &str) -> Option<(bool, String)> {
    let trimmed = raw.trim_start();
    let (negative, body) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let integer: String = body.chars().take_while(char::is_ascii_digit).collect();
    let rest = &body[integer.len()..];
    let fraction: String = match rest.strip_prefix('.') {
        Some(after_dot) => after_dot.chars().take_while(char::is_ascii_digit).collect(),
        None => String::new(),
    };

    if integer.is_empty() && fraction.is_empty() {
        return None;
    }

    let integer = if integer.is_empty() { "0" } else { integer.as_str() };
    let fraction = if fraction.is_empty() { "0" } else { fraction.as_str() };
    Some((negative, format!("{integer}.{fraction}")))
}

fn to_decimal(literal: &str) -> Result<Decimal, DomainError> {
    Decimal::from_str(literal).map_err(|_| DomainError::Validation(AMOUNT_TOO_LARGE.to_string()))
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentRequestForm {
    pub title: String,
    pub food_cost: String,
    pub labor_cost: String,
    pub vehicle_cost: String,
    pub fuel_cost: String,
    pub mileage: String,
    pub notes: String,
}

impl PaymentRequestForm {
    pub fn set_field(&mut self, field: &str, value: impl Into<String>) -> Result<(), DomainError> {
        let slot = match field {
            "title" => &mut self.title,
            "food_cost" | "foodCost" => &mut self.food_cost,
            "labor_cost" | "laborCost" => &mut self.labor_cost,
            "vehicle_cost" | "vehicleCost" => &mut self.vehicle_cost,
            "fuel_cost" | "fuelCost" => &mut self.fuel_cost,
            "mileage" => &mut self.mileage,
            "notes" => &mut self.notes,
            other => {
                return Err(DomainError::Validation(format!("unknown payment form field `{other}`")))
            }
        };
        *slot = value.into();
        Ok(())
    }

    pub fn costs(&self) -> Result<CostBreakdown, DomainError> {
        Ok(CostBreakdown {
            food_cost: parse_amount(&self.food_cost)?,
            labor_cost: parse_amount(&self.labor_cost)?,
            vehicle_cost: parse_amount(&self.vehicle_cost)?,
            fuel_cost: parse_amount(&self.fuel_cost)?,
            mileage: parse_amount(&self.mileage)?,
        })
    }

    pub fn total(&self) -> Result<Decimal, DomainError> {
        self.costs()?
            .total()
            .ok_or_else(|| DomainError::Validation(AMOUNT_TOO_LARGE.to_string()))
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.title.trim().is_empty() {
            return Err(DomainError::Validation(PAYMENT_TITLE_REQUIRED.to_string()));
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleAssignmentForm {
    pub vehicle_plate: String,
    pub vehicle_type: String,
    pub driver_name: String,
    pub driver_license: String,
}

impl VehicleAssignmentForm {
    pub fn validate(&self) -> Result<(), DomainError> {
        let fields =
            [&self.vehicle_plate, &self.vehicle_type, &self.driver_name, &self.driver_license];
        if fields.iter().any(|field| field.trim().is_empty()) {
            return Err(DomainError::Validation(REQUIRED_FIELDS_MISSING.to_string()));
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobForm {
    pub title: String,
    pub description: String,
    pub location: String,
    #[serde(default)]
    pub budget: String,
    #[serde(default)]
    pub due_date: String,
}

impl JobForm {
    pub fn validate(&self) -> Result<(), DomainError> {
        if [&self.title, &self.description, &self.location]
            .iter()
            .any(|field| field.trim().is_empty())
        {
            return Err(DomainError::Validation(REQUIRED_FIELDS_MISSING.to_string()));
        }
        self.parse_due_date().map(|_| ())
    }

    fn parse_due_date(&self) -> Result<Option<NaiveDate>, DomainError> {
        let raw = self.due_date.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").map(Some).map_err(|_| {
            DomainError::Validation(format!("due date `{raw}` must be formatted as YYYY-MM-DD"))
        })
    }

    pub fn build(&self, created_by: &ActorId, at: DateTime<Utc>) -> Result<Job, DomainError> {
        self.validate()?;
        Ok(Job {
            id: JobId::generate(),
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            location: self.location.trim().to_string(),
            budget: parse_budget(&self.budget)?,
            status: JobStatus::Pending,
            assigned_to: None,
            due_date: self.parse_due_date()?,
            created_by: Some(created_by.clone()),
            created_at: at,
            updated_at: at,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;

    use super::{parse_amount, parse_budget, JobForm, PaymentRequestForm, VehicleAssignmentForm};
    use crate::errors::DomainError;
    use crate::domain::job::JobStatus;
    use crate::identity::ActorId;

    #[test]
    fn parse_amount_follows_lenient_numeric_prefix() {
        assert_eq!(parse_amount("60"), Ok(Decimal::new(60, 0)));
        assert_eq!(parse_amount(" 12.75 "), Ok(Decimal::new(1275, 2)));
        assert_eq!(parse_amount("12.5kg"), Ok(Decimal::new(125, 1)));
        assert_eq!(parse_amount(".5"), Ok(Decimal::new(5, 1)));
        assert_eq!(parse_amount("7."), Ok(Decimal::new(7, 0)));
    }

    #[test]
    fn parse_amount_refuses_numbers_beyond_decimal_range() {
        let error = parse_amount("99999999999999999999999999999999").expect_err("too large");
        assert_eq!(error, DomainError::Validation("Amount is too large".to_string()));

        assert_eq!(
            parse_amount("79228162514264337593543950335"),
            Ok(Decimal::MAX),
            "the largest representable value still parses"
        );
    }

    #[test]
    fn budget_rejects_negatives_instead_of_zeroing_them() {
        assert_eq!(parse_budget(""), Ok(Decimal::ZERO));
        assert_eq!(parse_budget("-0"), Ok(Decimal::ZERO));
        assert_eq!(parse_budget("250.50"), Ok(Decimal::new(25050, 2)));
        assert_eq!(
            parse_budget("-40"),
            Err(DomainError::Validation("Budget cannot be negative".to_string()))
        );
    }

    #[test]
    fn parse_amount_coerces_garbage_and_negatives_to_zero() {
        let huge_negative = "-99999999999999999999999999999999";
        for raw in ["", "abc", "-", ".", "-40", "  -0.5", "$20", huge_negative] {
            assert_eq!(parse_amount(raw), Ok(Decimal::ZERO), "{raw:?}");
        }
    }

    #[test]
    fn payment_form_total_excludes_mileage() {
        let mut form = PaymentRequestForm::default();
        form.set_field("title", "Site visit").expect("title");
        form.set_field("foodCost", "100").expect("food");
        form.set_field("labor_cost", "200").expect("labor");
        form.set_field("vehicle_cost", "50").expect("vehicle");
        form.set_field("fuel_cost", "60").expect("fuel");
        form.set_field("mileage", "100").expect("mileage");

        assert_eq!(form.total(), Ok(Decimal::new(410, 0)));
        assert_eq!(form.costs().map(|costs| costs.mileage), Ok(Decimal::new(100, 0)));
        assert!(form.set_field("tip", "5").is_err());
    }

    #[test]
    fn payment_form_total_refuses_overflowing_sums() {
        let form = PaymentRequestForm {
            title: "Site visit".to_string(),
            food_cost: "79228162514264337593543950335".to_string(),
            labor_cost: "79228162514264337593543950335".to_string(),
            ..Default::default()
        };

        let error = form.total().expect_err("sum overflows");
        assert_eq!(error.to_string(), "Amount is too large");
    }

    #[test]
    fn payment_form_requires_title_and_resets_to_defaults() {
        let mut form = PaymentRequestForm { title: "   ".to_string(), ..Default::default() };
        assert!(form.validate().is_err());

        form.title = "Fuel run".to_string();
        form.fuel_cost = "80".to_string();
        assert!(form.validate().is_ok());

        form.reset();
        assert_eq!(form, PaymentRequestForm::default());
    }

    #[test]
    fn vehicle_form_requires_every_field() {
        let mut form = VehicleAssignmentForm {
            vehicle_plate: "KX-4411".to_string(),
            vehicle_type: "Van".to_string(),
            driver_name: "Sam".to_string(),
            driver_license: " ".to_string(),
        };
        let error = form.validate().expect_err("license missing");
        assert_eq!(error.to_string(), "Please fill in all required fields");

        form.driver_license = "D-1".to_string();
        assert!(form.validate().is_ok());
    }

    #[test]
    fn job_form_builds_pending_job() {
        let form = JobForm {
            title: " Fence repair ".to_string(),
            description: "North side".to_string(),
            location: "Depot 4".to_string(),
            budget: "1500".to_string(),
            due_date: "2026-11-02".to_string(),
        };

        let job = form.build(&ActorId("2".to_string()), Utc::now()).expect("valid job");

        assert_eq!(job.title, "Fence repair");
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.budget, Decimal::new(1500, 0));
        assert_eq!(job.due_date, NaiveDate::from_ymd_opt(2026, 11, 2));
    }

    #[test]
    fn job_form_rejects_bad_due_date() {
        let form = JobForm {
            title: "Fence".to_string(),
            description: "North".to_string(),
            location: "Depot".to_string(),
            budget: String::new(),
            due_date: "next week".to_string(),
        };

        assert!(form.build(&ActorId("2".to_string()), Utc::now()).is_err());
    }

    #[test]
    fn job_form_rejects_negative_budget_like_a_patch_does() {
        let form = JobForm {
            title: "Fence".to_string(),
            description: "North".to_string(),
            location: "Depot".to_string(),
            budget: "-300".to_string(),
            due_date: String::new(),
        };

        let error = form.build(&ActorId("2".to_string()), Utc::now()).expect_err("negative");
        assert_eq!(error.to_string(), "Budget cannot be negative");
    }
}
