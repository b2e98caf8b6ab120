use rust_decimal::{Decimal, RoundingStrategy};

/// Format an amount with thousands separators and two decimals: 1,234.56
pub fn money(val: Decimal) -> String {
    let negative = val.is_sign_negative() && !val.is_zero();
    let cents = val
        .abs()
        .round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven);
    let text = format!("{cents:.2}");
    let (int_part, dec_part) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut with_commas = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            with_commas.push(',');
        }
        with_commas.push(c);
    }
    let with_commas: String = with_commas.chars().rev().collect();

    if negative {
        format!("-{with_commas}.{dec_part}")
    } else {
        format!("{with_commas}.{dec_part}")
    }
}

/// Confidence score as a whole percentage.
pub fn percent(score: f64) -> String {
    format!("{:.0}%", score * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_formatting() {
        assert_eq!(money(dec!(1234.56)), "1,234.56");
        assert_eq!(money(dec!(-500)), "-500.00");
        assert_eq!(money(Decimal::ZERO), "0.00");
        assert_eq!(money(dec!(1000000.99)), "1,000,000.99");
        assert_eq!(money(dec!(42.1)), "42.10");
        assert_eq!(money(dec!(0.125)), "0.12");
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(0.876), "88%");
        assert_eq!(percent(1.0), "100%");
    }
}
