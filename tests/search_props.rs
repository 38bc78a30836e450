#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use proptest::prelude::*;

use clientdesk_lib::{
    model::{Client, ClientStatus, Role},
    search::filter_clients,
    store::MemoryStore,
    sync::{ClientView, ListSynchronizer},
};

fn build(fields: Vec<(String, String, String)>) -> Vec<Client> {
    fields
        .into_iter()
        .enumerate()
        .map(|(index, (name, company, address))| Client {
            id: index as i64 + 1,
            name,
            company,
            address,
            status: ClientStatus::Ongoing,
            created_by: "u-1".into(),
            created_at: index as i64,
            assignments: Vec::new(),
        })
        .collect()
}

fn field() -> impl Strategy<Value = String> {
    "[a-cA-C ]{0,6}"
}

fn clients() -> impl Strategy<Value = Vec<Client>> {
    prop::collection::vec((field(), field(), field()), 0..12).prop_map(build)
}

fn hit(haystack: &str, query: &str) -> bool {
    haystack.to_lowercase().contains(&query.to_lowercase())
}

proptest! {
    #[test]
    fn filter_is_an_ordered_subsequence_of_matches(
        input in clients(),
        query in "[a-cA-C]{1,3}",
    ) {
        let output = filter_clients(&input, &query);

        let ids: Vec<i64> = output.iter().map(|c| c.id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        sorted.dedup();
        prop_assert_eq!(&ids, &sorted);

        for client in &input {
            let expected = hit(&client.name, &query)
                || hit(&client.company, &query)
                || hit(&client.address, &query);
            prop_assert_eq!(ids.contains(&client.id), expected);
        }
        for client in &output {
            let original = input.iter().find(|c| c.id == client.id).expect("from input");
            prop_assert_eq!(client, original);
        }
    }

    #[test]
    fn empty_query_is_identity(input in clients()) {
        prop_assert_eq!(filter_clients(&input, ""), input);
    }

    #[test]
    fn filter_is_deterministic(input in clients(), query in "[a-c ]{0,3}") {
        prop_assert_eq!(filter_clients(&input, &query), filter_clients(&input, &query));
    }

    #[test]
    fn finance_scope_only_returns_completed_clients(
        statuses in prop::collection::vec(prop_oneof![Just("ongoing"), Just("ecomplete"), Just("archived")], 0..10),
    ) {
        let runtime = tokio::runtime::Runtime::new().expect("create tokio runtime");
        runtime.block_on(async move {
            let store = Arc::new(MemoryStore::new());
            for (index, status) in statuses.iter().enumerate() {
                store.seed_client(&format!("c{index}"), "Co", "St", ClientStatus::from(*status));
            }
            let expected = statuses.iter().filter(|s| **s == "ecomplete").count();

            let sync = ListSynchronizer::new(store.clone(), ClientView::Finance);
            let first = sync.load(&Role::FinanceEmployee).await.unwrap();
            let second = sync.load(&Role::FinanceEmployee).await.unwrap();

            assert_eq!(first.len(), expected);
            assert!(first.clients().iter().all(|c| c.status == ClientStatus::Ecomplete));
            assert_eq!(first.clients(), second.clients());
        });
    }
}
