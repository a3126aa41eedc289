use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::future::join_all;
use proptest::prelude::*;
use quill_core::{BatchFetch, BatchLoader, Keyed};

#[derive(Debug, Clone, PartialEq)]
struct Row {
    id: u8,
}

impl Keyed for Row {
    type Key = u8;

    fn key(&self) -> u8 {
        self.id
    }
}

/// Backend where only even ids exist; every requested key is logged
#[derive(Default)]
struct EvenRows {
    requested: Mutex<Vec<u8>>,
    batches: Mutex<usize>,
}

#[async_trait]
impl BatchFetch for EvenRows {
    type Value = Row;
    type Error = std::io::Error;

    async fn fetch_many(&self, keys: &[u8]) -> Result<Vec<Row>, std::io::Error> {
        self.requested.lock().unwrap().extend_from_slice(keys);
        *self.batches.lock().unwrap() += 1;
        tokio::task::yield_now().await;
        Ok(keys
            .iter()
            .filter(|id| *id % 2 == 0)
            .map(|&id| Row { id })
            .collect())
    }
}

fn expected(key: u8) -> Option<Row> {
    (key % 2 == 0).then_some(Row { id: key })
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn assert_each_key_fetched_once(requested: &[u8]) -> Result<(), TestCaseError> {
    let mut sorted = requested.to_vec();
    sorted.sort_unstable();
    let before = sorted.len();
    sorted.dedup();
    prop_assert_eq!(sorted.len(), before, "key fetched twice: {:?}", requested);
    Ok(())
}

proptest! {
    /// Property: output[i] is the resolved value for keys[i]
    #[test]
    fn prop_output_matches_input_positions(keys in prop::collection::vec(any::<u8>(), 0..64)) {
        let values = runtime().block_on(async {
            let loader = BatchLoader::new(EvenRows::default());
            loader.load(&keys).await.unwrap()
        });

        prop_assert_eq!(values.len(), keys.len());
        for (key, value) in keys.iter().zip(values) {
            prop_assert_eq!(value, expected(*key));
        }
    }

    /// Property: across sequential loads each distinct key is fetched once
    #[test]
    fn prop_sequential_loads_fetch_once(
        first in prop::collection::vec(any::<u8>(), 0..32),
        second in prop::collection::vec(any::<u8>(), 0..32),
    ) {
        let (requested, batches) = runtime().block_on(async {
            let loader = BatchLoader::new(EvenRows::default());
            loader.load(&first).await.unwrap();
            loader.load(&second).await.unwrap();
            let fetcher = loader.fetcher();
            let requested = fetcher.requested.lock().unwrap().clone();
            let batches = *fetcher.batches.lock().unwrap();
            (requested, batches)
        });

        assert_each_key_fetched_once(&requested)?;
        prop_assert!(batches <= 2);

        let mut distinct: Vec<u8> = first.iter().chain(second.iter()).copied().collect();
        distinct.sort_unstable();
        distinct.dedup();
        prop_assert_eq!(requested.len(), distinct.len());
    }

    /// Property: interleaved loads on one instance never refetch a key
    #[test]
    fn prop_interleaved_loads_fetch_once(
        batches in prop::collection::vec(prop::collection::vec(any::<u8>(), 1..16), 1..8),
    ) {
        let (results, requested) = runtime().block_on(async {
            let loader = BatchLoader::new(EvenRows::default());
            let results = join_all(batches.iter().map(|keys| loader.load(keys))).await;
            let requested = loader.fetcher().requested.lock().unwrap().clone();
            (results, requested)
        });

        assert_each_key_fetched_once(&requested)?;
        for (keys, result) in batches.iter().zip(results) {
            let values = result.unwrap();
            prop_assert_eq!(values.len(), keys.len());
            for (key, value) in keys.iter().zip(values) {
                prop_assert_eq!(value, expected(*key));
            }
        }
    }
}

#[test]
fn second_load_of_absent_key_makes_no_call() {
    runtime().block_on(async {
        let loader = BatchLoader::new(EvenRows::default());

        assert_eq!(loader.load(&[5]).await.unwrap(), vec![None]);
        assert_eq!(loader.load(&[5]).await.unwrap(), vec![None]);

        assert_eq!(*loader.fetcher().batches.lock().unwrap(), 1);
    });
}
