use std::sync::Arc;

use eventlog::event_sourcing::{
    Aggregate, DomainEvent, Event, EventPayload, InMemoryDriver, PayloadRegistry, Store, StoreError, StreamReader,
    Versionable,
};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
struct Deposited {
    amount: i64,
}

impl DomainEvent for Deposited {
    const EVENT_TYPE: &'static str = "Deposited";
    const AGGREGATE_TYPE: &'static str = "Account";
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
struct Withdrawn {
    amount: i64,
}

impl DomainEvent for Withdrawn {
    const EVENT_TYPE: &'static str = "Withdrawn";
    const AGGREGATE_TYPE: &'static str = "Account";
}

#[derive(Default)]
struct Account {
    versionable: Versionable,
    id: String,
    balance: i64,
}

impl Account {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Default::default()
        }
    }

    fn deposit(&mut self, amount: i64) -> Vec<eventlog::event_sourcing::AppliedEvent> {
        let event = Event::new(self.id.clone(), Deposited { amount });
        self.apply(vec![event])
    }

    fn withdraw(&mut self, amount: i64) -> Vec<eventlog::event_sourcing::AppliedEvent> {
        let event = Event::new(self.id.clone(), Withdrawn { amount });
        self.apply(vec![event])
    }
}

impl Aggregate for Account {
    fn reduce(&mut self, _event_type: &str, payload: &dyn EventPayload) {
        if let Some(e) = payload.downcast_ref::<Deposited>() {
            self.balance += e.amount;
        } else if let Some(e) = payload.downcast_ref::<Withdrawn>() {
            self.balance -= e.amount;
        }
    }

    fn versionable(&self) -> &Versionable {
        &self.versionable
    }

    fn versionable_mut(&mut self) -> &mut Versionable {
        &mut self.versionable
    }
}

fn registry() -> Arc<PayloadRegistry> {
    PayloadRegistry::builder()
        .register::<Deposited>()
        .unwrap()
        .register::<Withdrawn>()
        .unwrap()
        .build()
}

#[tokio::test]
async fn test_save_then_load_rebuilds_state() {
    let driver = Arc::new(InMemoryDriver::new(registry()));
    let store = Store::from_shared(driver.clone());

    let mut account = Account::new("acc-1");
    let mut applied = account.deposit(100);
    applied.extend(account.withdraw(30));
    let saved = store.save(applied).await.unwrap();

    assert_eq!(saved.iter().map(|e| e.id).collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(saved.iter().map(|e| e.aggregate_version).collect::<Vec<_>>(), vec![1, 2]);

    let mut reloaded = Account::new("acc-1");
    store.load("acc-1", &mut reloaded).await.unwrap();

    assert_eq!(reloaded.balance, 70);
    assert_eq!(reloaded.version(), 2);
}

#[tokio::test]
async fn test_hydrated_aggregate_continues_versioning() {
    let store = Store::new(InMemoryDriver::new(registry()));

    let mut account = Account::new("acc-1");
    store.save(account.deposit(10)).await.unwrap();

    let mut reloaded = Account::new("acc-1");
    store.load("acc-1", &mut reloaded).await.unwrap();
    let saved = store.save(reloaded.deposit(5)).await.unwrap();

    assert_eq!(saved[0].aggregate_version, 2);
}

#[tokio::test]
async fn test_stale_instance_loses() {
    let store = Store::new(InMemoryDriver::new(registry()));

    let mut first = Account::new("acc-1");
    let mut stale = Account::new("acc-1");
    store.save(first.deposit(10)).await.unwrap();

    let err = store.save(stale.deposit(99)).await.unwrap_err();

    assert!(matches!(
        err,
        StoreError::OptimisticLockViolation { ref aggregate_id, aggregate_version: 1 } if aggregate_id == "acc-1"
    ));

    let mut reloaded = Account::new("acc-1");
    store.load("acc-1", &mut reloaded).await.unwrap();
    assert_eq!(reloaded.balance, 10);
}

#[tokio::test]
async fn test_empty_save_is_a_no_op() {
    let driver = Arc::new(InMemoryDriver::new(registry()));
    let store = Store::from_shared(driver.clone());

    let saved = store.save(Vec::new()).await.unwrap();

    assert!(saved.is_empty());
    assert!(driver.is_empty().await);
}

#[tokio::test]
async fn test_unregistered_type_fails_load() {
    // Writes only need the payload itself; reads need a decoder.
    let narrow = PayloadRegistry::builder().register::<Withdrawn>().unwrap().build();
    let store = Store::new(InMemoryDriver::new(narrow));

    store.save(Account::new("acc-1").deposit(1)).await.unwrap();

    let err = store.load("acc-1", &mut Account::new("acc-1")).await.unwrap_err();
    assert!(matches!(err, StoreError::NotRegistered { ref event_type } if event_type == "Deposited"));
}

#[tokio::test]
async fn test_stream_reading() {
    let driver = Arc::new(InMemoryDriver::new(registry()));
    let store = Store::from_shared(driver.clone());

    let mut a = Account::new("a");
    let mut b = Account::new("b");
    store.save(a.deposit(1)).await.unwrap();
    store.save(b.withdraw(2)).await.unwrap();
    store.save(a.withdraw(3)).await.unwrap();

    let after_first = driver.read_forward(1, 10).await.unwrap();
    assert_eq!(after_first.iter().map(|e| e.id).collect::<Vec<_>>(), vec![2, 3]);

    let capped = driver.read_forward(0, 2).await.unwrap();
    assert_eq!(capped.len(), 2);

    let withdrawals = driver.read_of_types(0, 10, &["Withdrawn".to_string()]).await.unwrap();
    assert_eq!(withdrawals.iter().map(|e| e.id).collect::<Vec<_>>(), vec![2, 3]);

    assert!(driver.read_of_types(0, 10, &[]).await.unwrap().is_empty());
}
