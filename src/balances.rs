use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::Result;
use crate::models::{Account, SlaveTransaction, Transaction};
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountBalance {
    pub account: Account,
    pub balance: Decimal,
}

/// Opening amount plus every master and slave booked on the account,
/// credits positive and debits negative.
pub fn account_balance(
    account: &Account,
    transactions: &[Transaction],
    slaves: &[SlaveTransaction],
) -> Decimal {
    let masters: Decimal = transactions
        .iter()
        .filter(|t| t.account_id == account.id)
        .map(Transaction::signed_amount)
        .sum();
    let legs: Decimal = slaves
        .iter()
        .filter(|s| s.account_id == account.id)
        .map(|s| s.kind.signed(s.amount))
        .sum();
    account.original_amount + masters + legs
}

pub fn balances<S: Store + ?Sized>(store: &S) -> Result<Vec<AccountBalance>> {
    let transactions = store.transactions()?;
    let slaves = store.all_slaves()?;
    Ok(store
        .accounts()?
        .into_iter()
        .map(|account| {
            let balance = account_balance(&account, &transactions, &slaves);
            AccountBalance { account, balance }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use crate::models::{AccountDraft, SlaveDraft, TransactionDraft, TransactionType};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    #[test]
    fn test_balances_follow_slaves() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("test.db")).unwrap();
        let checking = store
            .create_account(&AccountDraft {
                name: "Checking".into(),
                category: "Banque".into(),
                sub_category: "Courant".into(),
                is_real: true,
                original_amount: dec!(1000.00),
            })
            .unwrap();
        let food = store
            .create_account(&AccountDraft {
                name: "Food".into(),
                category: "Dépenses".into(),
                sub_category: "Alimentation".into(),
                is_real: false,
                original_amount: Decimal::ZERO,
            })
            .unwrap();
        let t = store
            .create_transaction(&TransactionDraft {
                account_id: checking.id,
                amount: dec!(42.00),
                kind: TransactionType::Debit,
                description: "CARREFOUR".into(),
                date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            })
            .unwrap();

        let before = balances(&store).unwrap();
        let unknown = before.iter().find(|b| b.account.is_unknown()).unwrap();
        assert_eq!(unknown.balance, dec!(42.00));

        store
            .categorize(t.id, &[SlaveDraft::mirror(&t, food.id, t.amount)])
            .unwrap();
        let after = balances(&store).unwrap();
        let get = |id| after.iter().find(|b| b.account.id == id).unwrap().balance;
        assert_eq!(get(checking.id), dec!(958.00));
        assert_eq!(get(food.id), dec!(42.00));
        assert_eq!(get(store.unknown_account().unwrap().id), Decimal::ZERO);
    }
}
