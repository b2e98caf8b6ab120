use rust_decimal::Decimal;

use crate::error::{PloutosError, Result};
use crate::models::{SlaveDraft, SlaveTransaction, Transaction, TransactionType};

/// Legs balance when master and slaves differ by strictly less than a cent.
pub const BALANCE_EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Anything that can stand on the slave side of a master.
pub trait Leg {
    fn leg_amount(&self) -> Decimal;
    fn leg_kind(&self) -> TransactionType;

    /// What the leg contributes toward the master. Slaves carry the mirrored
    /// type, so a credit slave under a debit master contributes negatively.
    fn contribution(&self) -> Decimal {
        -self.leg_kind().signed(self.leg_amount())
    }
}

impl Leg for SlaveTransaction {
    fn leg_amount(&self) -> Decimal {
        self.amount
    }
    fn leg_kind(&self) -> TransactionType {
        self.kind
    }
}

impl Leg for SlaveDraft {
    fn leg_amount(&self) -> Decimal {
        self.amount
    }
    fn leg_kind(&self) -> TransactionType {
        self.kind
    }
}

fn allocated<L: Leg>(slaves: &[L]) -> Decimal {
    slaves.iter().map(Leg::contribution).sum()
}

/// Master delta not yet covered by the slaves.
pub fn unallocated<L: Leg>(master: &Transaction, slaves: &[L]) -> Decimal {
    master.signed_amount() - allocated(slaves)
}

pub fn is_balanced<L: Leg>(master: &Transaction, slaves: &[L]) -> bool {
    unallocated(master, slaves).abs() < BALANCE_EPSILON
}

pub fn ensure_balanced<L: Leg>(master: &Transaction, slaves: &[L]) -> Result<()> {
    if is_balanced(master, slaves) {
        Ok(())
    } else {
        Err(PloutosError::Reconciliation {
            expected: master.signed_amount(),
            actual: allocated(slaves),
        })
    }
}

/// Gate for slaves edited by hand before they replace the stored ones.
pub fn validate_slave_edits(master: &Transaction, slaves: &[SlaveDraft]) -> Result<()> {
    if slaves.is_empty() {
        return Err(PloutosError::InvalidSlaves(
            "a transaction needs at least one slave".into(),
        ));
    }
    for (i, slave) in slaves.iter().enumerate() {
        let row = i + 1;
        if slave.master_id != master.id {
            return Err(PloutosError::InvalidSlaves(format!(
                "slave {row} belongs to transaction {}, not {}",
                slave.master_id, master.id
            )));
        }
        if slave.account_id.is_none() {
            return Err(PloutosError::InvalidSlaves(format!(
                "slave {row} has no account"
            )));
        }
        if slave.amount <= Decimal::ZERO {
            return Err(PloutosError::InvalidSlaves(format!(
                "slave {row} has a non-positive amount ({})",
                slave.amount
            )));
        }
    }
    ensure_balanced(master, slaves)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn master(amount: Decimal, kind: TransactionType) -> Transaction {
        let date = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        Transaction {
            id: 1,
            account_id: 1,
            amount,
            kind,
            description: "PRLV".into(),
            date,
            created_at: date.and_hms_opt(0, 0, 0).unwrap(),
            updated_at: date.and_hms_opt(0, 0, 0).unwrap(),
        }
    }

    fn slave(account_id: i64, amount: Decimal, kind: TransactionType) -> SlaveDraft {
        SlaveDraft {
            master_id: 1,
            account_id: Some(account_id),
            amount,
            kind,
            date: NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
        }
    }

    #[test]
    fn test_mirrored_slaves_balance() {
        let m = master(dec!(100.00), TransactionType::Debit);
        let slaves = vec![
            slave(2, dec!(33.33), TransactionType::Credit),
            slave(3, dec!(33.33), TransactionType::Credit),
            slave(4, dec!(33.34), TransactionType::Credit),
        ];
        assert!(is_balanced(&m, &slaves));
        assert_eq!(unallocated(&m, &slaves), Decimal::ZERO);
    }

    #[test]
    fn test_balance_is_order_independent() {
        let m = master(dec!(50.00), TransactionType::Credit);
        let mut slaves = vec![
            slave(2, dec!(70.00), TransactionType::Debit),
            slave(3, dec!(20.00), TransactionType::Credit),
        ];
        assert!(is_balanced(&m, &slaves));
        slaves.reverse();
        assert!(is_balanced(&m, &slaves));
    }

    #[test]
    fn test_epsilon_is_strict() {
        let m = master(dec!(10.00), TransactionType::Debit);
        assert!(is_balanced(&m, &[slave(2, dec!(9.995), TransactionType::Credit)]));
        assert!(!is_balanced(&m, &[slave(2, dec!(9.99), TransactionType::Credit)]));
    }

    #[test]
    fn test_wrong_direction_is_unbalanced() {
        let m = master(dec!(42.00), TransactionType::Debit);
        let err = ensure_balanced(&m, &[slave(2, dec!(42.00), TransactionType::Debit)]).unwrap_err();
        match err {
            PloutosError::Reconciliation { expected, actual } => {
                assert_eq!(expected, dec!(-42.00));
                assert_eq!(actual, dec!(42.00));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_slave_edits_gate() {
        let m = master(dec!(60.00), TransactionType::Debit);
        assert!(validate_slave_edits(&m, &[]).is_err());

        let mut unset = slave(2, dec!(60.00), TransactionType::Credit);
        unset.account_id = None;
        assert!(matches!(
            validate_slave_edits(&m, &[unset]),
            Err(PloutosError::InvalidSlaves(_))
        ));

        let zero = vec![
            slave(2, dec!(60.00), TransactionType::Credit),
            slave(3, dec!(0), TransactionType::Credit),
        ];
        assert!(matches!(
            validate_slave_edits(&m, &zero),
            Err(PloutosError::InvalidSlaves(_))
        ));

        let short = vec![slave(2, dec!(50.00), TransactionType::Credit)];
        assert!(matches!(
            validate_slave_edits(&m, &short),
            Err(PloutosError::Reconciliation { .. })
        ));

        let ok = vec![
            slave(2, dec!(45.00), TransactionType::Credit),
            slave(3, dec!(15.00), TransactionType::Credit),
        ];
        assert!(validate_slave_edits(&m, &ok).is_ok());
    }
}
