// db/walletdb.rs
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use num_traits::ToPrimitive;
use sqlx::{Error, Row};
use uuid::Uuid;

use super::db::DBClient;
use crate::models::paymentmodels::{BankDetails, Wallet};

const WALLET_COLUMNS: &str = r#"
    id,
    user_id,
    balance,
    available_balance,
    escrow_balance,
    currency,
    is_verified,
    bank_name,
    account_number,
    account_name,
    bank_code,
    created_at,
    updated_at
"#;

/// Wallet primitives. Every mutation is a single UPDATE with the arithmetic
/// and its guard predicate in SQL, so two concurrent mutations of one wallet
/// serialize on the row lock and can neither lose an update nor overdraw.
///
/// Balance model: `balance == available_balance + escrow_balance` at all
/// times. Escrowed funds are recognized on the payee wallet at hold time
/// (`balance` and `escrow_balance` grow together); release moves the held
/// amount into `available_balance`, refund removes it from the ledger again.
#[async_trait]
pub trait WalletExt {
    async fn get_wallet(&self, user_id: Uuid) -> Result<Option<Wallet>, Error>;

    /// Wallets are created lazily on first payment interaction.
    async fn get_or_create_wallet(&self, user_id: Uuid) -> Result<Wallet, Error>;

    /// `balance += amount; available_balance += amount` (verified topup).
    async fn credit_wallet(&self, user_id: Uuid, amount: i64) -> Result<Wallet, Error>;

    /// `balance += amount; escrow_balance += amount` (project payment held
    /// for the payee).
    async fn hold_escrow(&self, user_id: Uuid, amount: i64) -> Result<Wallet, Error>;

    /// `escrow_balance -= amount; available_balance += amount`. Returns
    /// `None` when the guard `escrow_balance >= amount` fails.
    async fn release_escrow_hold(&self, user_id: Uuid, amount: i64)
        -> Result<Option<Wallet>, Error>;

    /// `escrow_balance -= amount; balance -= amount` — held funds leave the
    /// payee's ledger back to the payer. Returns `None` on guard failure.
    async fn refund_escrow_hold(&self, user_id: Uuid, amount: i64)
        -> Result<Option<Wallet>, Error>;

    /// `available_balance -= amount; balance -= amount` (withdrawal reserve).
    /// Returns `None` when the guard `available_balance >= amount` fails.
    async fn debit_available(&self, user_id: Uuid, amount: i64) -> Result<Option<Wallet>, Error>;

    /// Compensation for a failed payout: `available_balance += amount;
    /// balance += amount`.
    async fn credit_available(&self, user_id: Uuid, amount: i64) -> Result<Wallet, Error>;

    /// Stores bank details on the wallet and marks it verified for payouts.
    async fn save_bank_details(
        &self,
        user_id: Uuid,
        details: &BankDetails,
    ) -> Result<Wallet, Error>;

    async fn wallet_summary(&self, user_id: Uuid) -> Result<WalletSummary, Error>;
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct WalletSummary {
    pub balance: i64,
    pub available_balance: i64,
    pub escrow_balance: i64,
    pub currency: String,
    pub is_verified: bool,
    /// Sum of `held` payments where this user is the payee, computed from the
    /// payment ledger. Reconciles against `escrow_balance`.
    pub held_payments_total: i64,
    pub pending_withdrawals: i64,
}

#[async_trait]
impl WalletExt for DBClient {
    async fn get_wallet(&self, user_id: Uuid) -> Result<Option<Wallet>, Error> {
        sqlx::query_as::<_, Wallet>(&format!(
            "SELECT {WALLET_COLUMNS} FROM wallets WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_or_create_wallet(&self, user_id: Uuid) -> Result<Wallet, Error> {
        sqlx::query("INSERT INTO wallets (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        sqlx::query_as::<_, Wallet>(&format!(
            "SELECT {WALLET_COLUMNS} FROM wallets WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn credit_wallet(&self, user_id: Uuid, amount: i64) -> Result<Wallet, Error> {
        self.get_or_create_wallet(user_id).await?;

        sqlx::query_as::<_, Wallet>(&format!(
            r#"
            UPDATE wallets
            SET balance = balance + $2,
                available_balance = available_balance + $2,
                updated_at = NOW()
            WHERE user_id = $1
            RETURNING {WALLET_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(amount)
        .fetch_one(&self.pool)
        .await
    }

    async fn hold_escrow(&self, user_id: Uuid, amount: i64) -> Result<Wallet, Error> {
        self.get_or_create_wallet(user_id).await?;

        sqlx::query_as::<_, Wallet>(&format!(
            r#"
            UPDATE wallets
            SET balance = balance + $2,
                escrow_balance = escrow_balance + $2,
                updated_at = NOW()
            WHERE user_id = $1
            RETURNING {WALLET_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(amount)
        .fetch_one(&self.pool)
        .await
    }

    async fn release_escrow_hold(
        &self,
        user_id: Uuid,
        amount: i64,
    ) -> Result<Option<Wallet>, Error> {
        sqlx::query_as::<_, Wallet>(&format!(
            r#"
            UPDATE wallets
            SET escrow_balance = escrow_balance - $2,
                available_balance = available_balance + $2,
                updated_at = NOW()
            WHERE user_id = $1 AND escrow_balance >= $2
            RETURNING {WALLET_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(amount)
        .fetch_optional(&self.pool)
        .await
    }

    async fn refund_escrow_hold(
        &self,
        user_id: Uuid,
        amount: i64,
    ) -> Result<Option<Wallet>, Error> {
        sqlx::query_as::<_, Wallet>(&format!(
            r#"
            UPDATE wallets
            SET escrow_balance = escrow_balance - $2,
                balance = balance - $2,
                updated_at = NOW()
            WHERE user_id = $1 AND escrow_balance >= $2
            RETURNING {WALLET_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(amount)
        .fetch_optional(&self.pool)
        .await
    }

    async fn debit_available(&self, user_id: Uuid, amount: i64) -> Result<Option<Wallet>, Error> {
        sqlx::query_as::<_, Wallet>(&format!(
            r#"
            UPDATE wallets
            SET available_balance = available_balance - $2,
                balance = balance - $2,
                updated_at = NOW()
            WHERE user_id = $1 AND available_balance >= $2
            RETURNING {WALLET_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(amount)
        .fetch_optional(&self.pool)
        .await
    }

    async fn credit_available(&self, user_id: Uuid, amount: i64) -> Result<Wallet, Error> {
        sqlx::query_as::<_, Wallet>(&format!(
            r#"
            UPDATE wallets
            SET available_balance = available_balance + $2,
                balance = balance + $2,
                updated_at = NOW()
            WHERE user_id = $1
            RETURNING {WALLET_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(amount)
        .fetch_one(&self.pool)
        .await
    }

    async fn save_bank_details(
        &self,
        user_id: Uuid,
        details: &BankDetails,
    ) -> Result<Wallet, Error> {
        self.get_or_create_wallet(user_id).await?;

        sqlx::query_as::<_, Wallet>(&format!(
            r#"
            UPDATE wallets
            SET bank_name = $2,
                account_number = $3,
                account_name = $4,
                bank_code = $5,
                is_verified = true,
                updated_at = NOW()
            WHERE user_id = $1
            RETURNING {WALLET_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(&details.bank_name)
        .bind(&details.account_number)
        .bind(&details.account_name)
        .bind(&details.bank_code)
        .fetch_one(&self.pool)
        .await
    }

    async fn wallet_summary(&self, user_id: Uuid) -> Result<WalletSummary, Error> {
        let wallet = self.get_or_create_wallet(user_id).await?;

        let held = sqlx::query(
            r#"
            SELECT COALESCE(SUM(amount), 0) AS total
            FROM payments
            WHERE payee_id = $1 AND escrow_status = 'held'
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        let pending = sqlx::query(
            r#"
            SELECT COALESCE(SUM(amount), 0) AS total
            FROM withdrawals
            WHERE user_id = $1 AND status IN ('pending', 'processing')
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(WalletSummary {
            balance: wallet.balance,
            available_balance: wallet.available_balance,
            escrow_balance: wallet.escrow_balance,
            currency: wallet.currency,
            is_verified: wallet.is_verified,
            held_payments_total: held
                .get::<Option<BigDecimal>, _>("total")
                .and_then(|bd| bd.to_i64())
                .unwrap_or(0),
            pending_withdrawals: pending
                .get::<Option<BigDecimal>, _>("total")
                .and_then(|bd| bd.to_i64())
                .unwrap_or(0),
        })
    }
}

#[cfg(test)]
mod tests {
    //! Model check of the SQL arithmetic above: each primitive's balance
    //! moves and guard predicates, replayed over operation sequences.

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Balances {
        balance: i64,
        available: i64,
        escrow: i64,
    }

    impl Balances {
        fn zero() -> Self {
            Balances { balance: 0, available: 0, escrow: 0 }
        }

        fn reconciles(&self) -> bool {
            self.balance == self.available + self.escrow
                && self.balance >= 0
                && self.available >= 0
                && self.escrow >= 0
        }

        fn credit(&mut self, amount: i64) {
            self.balance += amount;
            self.available += amount;
        }

        fn hold(&mut self, amount: i64) {
            self.balance += amount;
            self.escrow += amount;
        }

        fn release(&mut self, amount: i64) -> bool {
            if self.escrow < amount {
                return false;
            }
            self.escrow -= amount;
            self.available += amount;
            true
        }

        fn refund(&mut self, amount: i64) -> bool {
            if self.escrow < amount {
                return false;
            }
            self.escrow -= amount;
            self.balance -= amount;
            true
        }

        fn debit(&mut self, amount: i64) -> bool {
            if self.available < amount {
                return false;
            }
            self.available -= amount;
            self.balance -= amount;
            true
        }

        fn credit_back(&mut self, amount: i64) {
            self.available += amount;
            self.balance += amount;
        }
    }

    #[test]
    fn topup_scenario() {
        let mut w = Balances::zero();
        w.credit(500_000); // 5,000 NGN

        assert_eq!(w.balance, 500_000);
        assert_eq!(w.available, 500_000);
        assert_eq!(w.escrow, 0);
        assert!(w.reconciles());
    }

    #[test]
    fn hold_then_release_scenario() {
        let mut w = Balances::zero();
        w.hold(1_000_000); // 10,000 NGN held for the payee

        assert_eq!(w.escrow, 1_000_000);
        assert_eq!(w.available, 0);
        assert!(w.reconciles());

        assert!(w.release(1_000_000));
        assert_eq!(w.escrow, 0);
        assert_eq!(w.available, 1_000_000);
        assert!(w.reconciles());
    }

    #[test]
    fn hold_then_refund_removes_funds_from_ledger() {
        let mut w = Balances::zero();
        w.hold(1_000_000);

        assert!(w.refund(1_000_000));
        assert_eq!(w, Balances::zero());
        assert!(w.reconciles());
    }

    #[test]
    fn withdrawal_reserve_and_compensation_scenario() {
        let mut w = Balances::zero();
        w.credit(1_000_000); // 10,000 NGN

        assert!(w.debit(300_000)); // request 3,000 NGN
        assert_eq!(w.available, 700_000);
        assert!(w.reconciles());

        w.credit_back(300_000); // payout failed
        assert_eq!(w.available, 1_000_000);
        assert!(w.reconciles());
    }

    #[test]
    fn guards_prevent_overdraw() {
        let mut w = Balances::zero();
        w.credit(100);
        w.hold(50);

        let before = w;
        assert!(!w.debit(200));
        assert!(!w.release(51));
        assert!(!w.refund(51));
        // Failed operations leave the wallet untouched.
        assert_eq!(w, before);
    }

    #[test]
    fn racing_withdrawals_cannot_jointly_overdraw() {
        let mut w = Balances::zero();
        w.credit(500_000);

        // Two concurrent requests for more than half the balance: the second
        // guarded debit must fail.
        assert!(w.debit(300_000));
        assert!(!w.debit(300_000));
        assert_eq!(w.available, 200_000);
        assert!(w.reconciles());
    }

    #[test]
    fn invariant_holds_across_mixed_sequences() {
        let mut w = Balances::zero();
        let amounts = [120_000, 35_000, 990_001, 1, 250_000];

        for (i, &amount) in amounts.iter().enumerate() {
            match i % 5 {
                0 => w.credit(amount),
                1 => w.hold(amount),
                2 => {
                    let _ = w.release(amount);
                }
                3 => {
                    let _ = w.debit(amount);
                }
                _ => {
                    let _ = w.refund(amount);
                }
            }
            assert!(w.reconciles(), "invariant broken after op {}", i);
        }
    }
}
