//! Dispatch properties over generated payloads.

use std::collections::HashMap;
use std::sync::Arc;

use event_relay::{DispatchError, EventBus, Params};
use parking_lot::Mutex;
use proptest::prelude::*;
use serde_json::{Map, Value};

use crate::support::resolve;

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(future)
}

/// Bus with a single handler that records what it receives.
fn recording_bus(name: &str) -> (EventBus, Arc<Mutex<Vec<Params>>>) {
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    let bus = EventBus::new().command(name, move |_, params| {
        sink.lock().push(params);
        Ok(())
    });
    (bus, received)
}

fn framed(name: &str, fields: &HashMap<String, i64>) -> (Vec<u8>, Params) {
    let params: Params = fields
        .iter()
        .map(|(k, v)| (k.clone(), Value::from(*v)))
        .collect();
    let mut object = params.clone();
    object.insert("event_name".to_string(), Value::String(name.to_string()));
    (serde_json::to_vec(&Value::Object(object)).unwrap(), params)
}

proptest! {
    #[test]
    fn handler_receives_payload_minus_name(
        name in "[a-z]{1,8}(\\.[a-z0-9]{1,8}){0,3}",
        fields in prop::collection::hash_map("[a-z]{1,10}", any::<i64>(), 0..8),
    ) {
        let (bus, received) = recording_bus(&name);
        let (data, expected) = framed(&name, &fields);

        block_on(resolve(&bus, data)).unwrap();

        let received = received.lock();
        prop_assert_eq!(received.len(), 1);
        prop_assert_eq!(&received[0], &expected);
    }

    #[test]
    fn surrounding_nuls_do_not_change_the_outcome(
        fields in prop::collection::hash_map("[a-z]{1,10}", any::<i64>(), 0..8),
        leading in 0usize..16,
        padding in 0usize..256,
    ) {
        let (bus, received) = recording_bus("padded");
        let (body, expected) = framed("padded", &fields);
        let mut data = vec![0u8; leading];
        data.extend_from_slice(&body);
        data.resize(data.len() + padding, 0);

        block_on(resolve(&bus, data)).unwrap();
        let received = received.lock();
        prop_assert_eq!(&received[0], &expected);
    }

    #[test]
    fn unregistered_names_are_reported(name in "[a-z]{1,12}") {
        let (bus, received) = recording_bus("registered.name");
        let (data, _) = framed(&name, &HashMap::new());

        let err = block_on(resolve(&bus, data)).unwrap_err();
        prop_assert!(matches!(err, DispatchError::EventNotRegistered(ref n) if n == &name));
        prop_assert!(received.lock().is_empty());
    }

    #[test]
    fn non_string_names_are_rejected(value in prop_oneof![
        any::<i64>().prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
        Just(Value::Null),
        Just(Value::Array(vec![])),
        Just(Value::Object(Map::new())),
    ]) {
        let (bus, _) = recording_bus("registered");
        let mut object = Map::new();
        object.insert("event_name".to_string(), value);
        let data = serde_json::to_vec(&Value::Object(object)).unwrap();

        let err = block_on(resolve(&bus, data)).unwrap_err();
        prop_assert!(matches!(err, DispatchError::WrongDataTypeName));
    }
}
