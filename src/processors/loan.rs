use chrono::{Datelike, NaiveDate};
use rust_decimal::{Decimal, MathematicalOps, RoundingStrategy};
use serde::Serialize;

use crate::error::{PloutosError, Result};
use crate::models::{LoanConfig, SlaveDraft, Transaction, TransactionType};

/// Rates above this are accepted but logged.
const HIGH_RATE_WARNING: Decimal = Decimal::from_parts(50, 0, 0, false, 0);

/// Longest loan term accepted: a century of monthly payments.
pub const MAX_DURATION_MONTHS: u32 = 1200;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Installment {
    pub number: u32,
    pub payment: Decimal,
    pub interest: Decimal,
    pub capital: Decimal,
    pub remaining: Decimal,
}

fn cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}

fn monthly_rate(config: &LoanConfig) -> Decimal {
    config.annual_rate / Decimal::ONE_HUNDRED / Decimal::from(12)
}

fn overflow() -> PloutosError {
    PloutosError::Configuration("loan figures are too large to amortize".into())
}

fn check_bounds(config: &LoanConfig) -> Result<()> {
    if config.loan_amount <= Decimal::ZERO {
        return Err(PloutosError::Configuration(format!(
            "loan_amount must be positive, got {}",
            config.loan_amount
        )));
    }
    if config.annual_rate < Decimal::ZERO || config.annual_rate > Decimal::ONE_HUNDRED {
        return Err(PloutosError::Configuration(format!(
            "annual_rate must be between 0 and 100, got {}",
            config.annual_rate
        )));
    }
    if config.duration_months == 0 || config.duration_months > MAX_DURATION_MONTHS {
        return Err(PloutosError::Configuration(format!(
            "duration_months must be between 1 and {MAX_DURATION_MONTHS}, got {}",
            config.duration_months
        )));
    }
    Ok(())
}

fn annuity(config: &LoanConfig) -> Result<Decimal> {
    let principal = config.loan_amount;
    let r = monthly_rate(config);
    if r.is_zero() {
        return Ok(cents(principal / Decimal::from(config.duration_months)));
    }
    let growth = (Decimal::ONE + r)
        .checked_powu(u64::from(config.duration_months))
        .ok_or_else(overflow)?;
    let payment = principal
        .checked_mul(r)
        .and_then(|v| v.checked_mul(growth))
        .and_then(|v| v.checked_div(growth - Decimal::ONE))
        .ok_or_else(overflow)?;
    Ok(cents(payment))
}

/// Checked when a rule is stored or enabled. Also computes the payment once,
/// so figures that overflow are refused here rather than on every run.
pub fn validate(config: &LoanConfig) -> Result<()> {
    check_bounds(config)?;
    annuity(config)?;
    if config.annual_rate > HIGH_RATE_WARNING {
        tracing::warn!(annual_rate = %config.annual_rate, "very high loan interest rate");
    }
    Ok(())
}

/// Fixed monthly payment, rounded to the cent.
pub fn monthly_payment(config: &LoanConfig) -> Result<Decimal> {
    check_bounds(config)?;
    annuity(config)
}

/// 1-indexed installment number for a repayment dated `date`. Only year and
/// month are compared.
pub fn payment_number(date: NaiveDate, start_date: NaiveDate) -> Result<u32> {
    let months = (date.year() - start_date.year()) * 12 + date.month() as i32
        - start_date.month() as i32;
    if months < 0 {
        return Err(PloutosError::Configuration(format!(
            "transaction date {date} is before loan start date {start_date}"
        )));
    }
    Ok(months as u32 + 1)
}

/// Full repayment table. Interest is charged on the outstanding balance each
/// month; the final installment clears whatever capital is left, so the
/// capital column always adds up to the loan amount.
pub fn amortization_schedule(config: &LoanConfig) -> Result<Vec<Installment>> {
    let payment = monthly_payment(config)?;
    let r = monthly_rate(config);
    let mut balance = config.loan_amount;
    let mut schedule = Vec::with_capacity(config.duration_months as usize);

    for number in 1..=config.duration_months {
        let interest = cents(balance * r);
        let (capital, payment) = if number == config.duration_months {
            (balance, balance.checked_add(interest).ok_or_else(overflow)?)
        } else {
            (payment - interest, payment)
        };
        balance -= capital;
        schedule.push(Installment {
            number,
            payment,
            interest,
            capital,
            remaining: balance,
        });
    }
    Ok(schedule)
}

/// Split a loan repayment into a capital slave and an interest slave.
/// Interest follows the schedule; capital absorbs any gap between the
/// scheduled and the actual payment.
pub fn process(transaction: &Transaction, config: &LoanConfig) -> Result<Vec<SlaveDraft>> {
    if transaction.kind != TransactionType::Debit {
        return Err(PloutosError::Configuration(format!(
            "loan repayment must be a debit, got {}",
            transaction.kind
        )));
    }
    let number = payment_number(transaction.date, config.start_date)?;
    if number > config.duration_months {
        return Err(PloutosError::Configuration(format!(
            "payment #{number} is past the loan term of {} months",
            config.duration_months
        )));
    }

    let schedule = amortization_schedule(config)?;
    let installment = &schedule[number as usize - 1];
    let capital = transaction.amount - installment.interest;
    if capital < Decimal::ZERO {
        return Err(PloutosError::Configuration(format!(
            "payment of {} does not cover the {} interest due",
            transaction.amount, installment.interest
        )));
    }

    tracing::debug!(
        transaction_id = transaction.id,
        "loan payment #{number}/{}: capital {capital}, interest {}, remaining {}",
        config.duration_months,
        installment.interest,
        installment.remaining
    );

    Ok(vec![
        SlaveDraft::mirror(transaction, config.capital_account_id, capital),
        SlaveDraft::mirror(transaction, config.interest_account_id, installment.interest),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TransactionFilter;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn mortgage() -> LoanConfig {
        LoanConfig {
            loan_amount: dec!(200000),
            annual_rate: dec!(1.5),
            duration_months: 240,
            start_date: date(2024, 1, 5),
            capital_account_id: 20,
            interest_account_id: 21,
            transaction_filter: TransactionFilter::Debit,
        }
    }

    fn repayment(amount: Decimal, on: NaiveDate, kind: TransactionType) -> Transaction {
        Transaction {
            id: 9,
            account_id: 1,
            amount,
            kind,
            description: "ECHEANCE PRET".into(),
            date: on,
            created_at: on.and_hms_opt(0, 0, 0).unwrap(),
            updated_at: on.and_hms_opt(0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_monthly_payment() {
        assert_eq!(monthly_payment(&mortgage()).unwrap(), dec!(965.09));
        let mut free = mortgage();
        free.annual_rate = Decimal::ZERO;
        free.loan_amount = dec!(1000);
        free.duration_months = 3;
        assert_eq!(monthly_payment(&free).unwrap(), dec!(333.33));
    }

    #[test]
    fn test_payment_number_ignores_day() {
        let start = date(2024, 1, 31);
        assert_eq!(payment_number(date(2024, 1, 1), start).unwrap(), 1);
        assert_eq!(payment_number(date(2024, 2, 29), start).unwrap(), 2);
        assert_eq!(payment_number(date(2025, 1, 15), start).unwrap(), 13);
        assert!(payment_number(date(2023, 12, 31), start).is_err());
    }

    #[test]
    fn test_schedule_capital_sums_to_loan_amount() {
        for config in [mortgage(), LoanConfig { annual_rate: Decimal::ZERO, duration_months: 7, loan_amount: dec!(1000), ..mortgage() }] {
            let schedule = amortization_schedule(&config).unwrap();
            assert_eq!(schedule.len(), config.duration_months as usize);
            let capital: Decimal = schedule.iter().map(|i| i.capital).sum();
            assert_eq!(capital, config.loan_amount);
            assert_eq!(schedule.last().unwrap().remaining, Decimal::ZERO);
            assert!(schedule.iter().all(|i| i.interest >= Decimal::ZERO));
        }
    }

    #[test]
    fn test_first_installment_interest() {
        let schedule = amortization_schedule(&mortgage()).unwrap();
        // 200000 * 0.015 / 12
        assert_eq!(schedule[0].interest, dec!(250.00));
        assert_eq!(schedule[0].capital, dec!(715.09));
    }

    #[test]
    fn test_process_splits_capital_and_interest() {
        let slaves = process(&repayment(dec!(965.09), date(2024, 1, 5), TransactionType::Debit), &mortgage()).unwrap();
        assert_eq!(slaves.len(), 2);
        assert_eq!(slaves[0].account_id, Some(20));
        assert_eq!(slaves[0].amount, dec!(715.09));
        assert_eq!(slaves[1].account_id, Some(21));
        assert_eq!(slaves[1].amount, dec!(250.00));
        assert!(slaves.iter().all(|s| s.kind == TransactionType::Credit));
    }

    #[test]
    fn test_capital_absorbs_deviation() {
        let slaves = process(&repayment(dec!(1000.00), date(2024, 1, 20), TransactionType::Debit), &mortgage()).unwrap();
        assert_eq!(slaves[0].amount, dec!(750.00));
        assert_eq!(slaves[1].amount, dec!(250.00));
    }

    #[test]
    fn test_process_rejects_out_of_term_and_credits() {
        let config = mortgage();
        assert!(process(&repayment(dec!(965.09), date(2023, 12, 5), TransactionType::Debit), &config).is_err());
        assert!(process(&repayment(dec!(965.09), date(2044, 1, 5), TransactionType::Debit), &config).is_err());
        assert!(process(&repayment(dec!(965.09), date(2043, 12, 5), TransactionType::Debit), &config).is_ok());
        let err = process(&repayment(dec!(965.09), date(2024, 3, 5), TransactionType::Credit), &config).unwrap_err();
        assert!(matches!(err, PloutosError::Configuration(_)));
    }

    #[test]
    fn test_payment_below_interest_is_rejected() {
        let err = process(&repayment(dec!(100), date(2024, 1, 5), TransactionType::Debit), &mortgage()).unwrap_err();
        assert!(matches!(err, PloutosError::Configuration(_)));
    }

    #[test]
    fn test_validate_bounds() {
        assert!(validate(&LoanConfig { loan_amount: Decimal::ZERO, ..mortgage() }).is_err());
        assert!(validate(&LoanConfig { duration_months: 0, ..mortgage() }).is_err());
        assert!(validate(&LoanConfig { annual_rate: dec!(101), ..mortgage() }).is_err());
        assert!(validate(&LoanConfig { annual_rate: dec!(75), ..mortgage() }).is_ok());
        assert!(validate(&LoanConfig { duration_months: MAX_DURATION_MONTHS + 1, ..mortgage() }).is_err());
    }

    #[test]
    fn test_oversized_loan_is_a_configuration_error() {
        let huge = LoanConfig {
            loan_amount: dec!(1000000),
            annual_rate: dec!(100),
            duration_months: 780,
            ..mortgage()
        };
        assert!(matches!(validate(&huge), Err(PloutosError::Configuration(_))));
        assert!(matches!(monthly_payment(&huge), Err(PloutosError::Configuration(_))));

        let century = LoanConfig { duration_months: MAX_DURATION_MONTHS, ..huge.clone() };
        assert!(matches!(amortization_schedule(&century), Err(PloutosError::Configuration(_))));

        let err = process(&repayment(dec!(965.09), date(2024, 1, 5), TransactionType::Debit), &huge).unwrap_err();
        assert!(matches!(err, PloutosError::Configuration(_)));
    }
}
