use std::{
    str::FromStr,
    sync::{Arc, Barrier},
    thread,
};

use bank_ledger::{
    account::{Account, AccountId},
    command::Money,
    config::BankConfig,
    coordinator::{BankingService, ErrorKind, transfer_coordinator::TransferCoordinator},
};
use rust_decimal::Decimal;

fn bank(balances: &[(&str, &str)]) -> Arc<TransferCoordinator> {
    let bank = TransferCoordinator::new(BankConfig {
        lock_timeout_ms: 5_000,
        ..BankConfig::default()
    });
    for (id, balance) in balances {
        bank.store()
            .accounts()
            .insert(Account::new(
                AccountId::new(*id),
                *id,
                Money::parse(balance).unwrap(),
            ))
            .unwrap();
    }
    Arc::new(bank)
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// Starts `n` threads at once, each running `op(i)`.
fn race<T: Send>(n: usize, op: impl Fn(usize) -> T + Sync) -> Vec<T> {
    let barrier = Barrier::new(n);
    thread::scope(|s| {
        let handles: Vec<_> = (0..n)
            .map(|i| {
                let barrier = &barrier;
                let op = &op;
                s.spawn(move || {
                    barrier.wait();
                    op(i)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

#[test]
fn two_concurrent_overdrafts_only_one_commits() {
    let bank = bank(&[("sender", "5000.00"), ("recipient", "0")]);

    let results = race(2, |_| bank.transfer("sender", "recipient", dec("3000.00")));

    let committed = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(committed, 1);
    let failed = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert_eq!(failed.kind(), ErrorKind::InsufficientFunds);

    assert_eq!(
        bank.get_account("sender").unwrap().balance(),
        Money::parse("2000.00").unwrap()
    );
    assert_eq!(bank.list_transactions("sender").unwrap().len(), 1);
    assert_eq!(bank.list_notifications("recipient").unwrap().len(), 1);
}

#[test]
fn commits_equal_floor_of_balance_over_amount() {
    const N: usize = 32;
    let bank = bank(&[("sender", "1000.00"), ("recipient", "0")]);

    let results = race(N, |_| bank.transfer("sender", "recipient", dec("70.00")));

    let committed = results.iter().filter(|r| r.is_ok()).count();
    // floor(1000 / 70) = 14
    assert_eq!(committed, 14);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|err| err.kind() == ErrorKind::InsufficientFunds)
    );

    let sender = bank.get_account("sender").unwrap().balance();
    assert_eq!(sender, Money::parse("20.00").unwrap());
    assert_eq!(
        bank.get_account("recipient").unwrap().balance(),
        Money::parse("980.00").unwrap()
    );
    assert_eq!(bank.list_transactions("sender").unwrap().len(), 14);
    assert_eq!(bank.list_transactions("recipient").unwrap().len(), 14);
}

#[test]
fn opposite_transfers_do_not_deadlock_and_conserve_money() {
    let bank = bank(&[("a", "500.00"), ("b", "500.00")]);

    race(40, |i| {
        let (from, to) = if i % 2 == 0 { ("a", "b") } else { ("b", "a") };
        for _ in 0..25 {
            // failures for lack of funds are fine here
            let _ = bank.transfer(from, to, dec("7.31"));
        }
    });

    let a = bank.get_account("a").unwrap().balance();
    let b = bank.get_account("b").unwrap().balance();
    assert!(!a.is_negative());
    assert!(!b.is_negative());
    assert_eq!(a.minor_units() + b.minor_units(), 100_000);
}

#[test]
fn every_committed_transfer_is_double_entry() {
    let bank = bank(&[("a", "300.00"), ("b", "300.00"), ("c", "300.00")]);
    let ids = ["a", "b", "c"];

    race(12, |i| {
        for round in 0..20 {
            let from = ids[(i + round) % 3];
            let to = ids[(i + round + 1) % 3];
            let _ = bank.transfer(from, to, dec("11.11"));
            let _ = bank.pay_bill(from, "Electric Co", dec("0.01"));
        }
    });

    let mut entries: Vec<_> = ids
        .iter()
        .flat_map(|id| bank.list_transactions(id).unwrap())
        .collect();
    let bills = entries
        .iter()
        .filter(|e| e.description.starts_with("Bill payment"))
        .count();
    entries.retain(|e| !e.description.starts_with("Bill payment"));
    assert_eq!(entries.len() % 2, 0);

    // group transfer legs by their unit of work timestamp and check they cancel out
    let mut by_time = std::collections::BTreeMap::<_, Vec<i64>>::new();
    for entry in &entries {
        by_time
            .entry(entry.created_at)
            .or_default()
            .push(entry.amount.minor_units());
    }
    for legs in by_time.values() {
        assert_eq!(legs.len() % 2, 0);
        assert_eq!(legs.iter().sum::<i64>(), 0);
    }

    // money only left the system through bills
    let total: i64 = ids
        .iter()
        .map(|id| bank.get_account(id).unwrap().balance().minor_units())
        .sum();
    assert_eq!(total, 90_000 - bills as i64);

    let notifications: usize = ids
        .iter()
        .map(|id| bank.list_notifications(id).unwrap().len())
        .sum();
    assert_eq!(notifications, entries.len() / 2);
}
