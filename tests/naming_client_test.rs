mod common;

#[cfg(feature = "naming")]
#[cfg(test)]
mod naming_client_tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use nacos_binding::api::error::Error;
    use nacos_binding::api::naming::{
        NacosServiceInstance, NamingChangeEvent, NamingClientBuilder, NamingEventListener,
    };

    use crate::common::{self, wait_until, MockNacosServer};

    type Events = Arc<Mutex<Vec<NamingChangeEvent>>>;

    fn recording_listener() -> (Arc<dyn NamingEventListener>, Events) {
        let events: Events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let listener: Arc<dyn NamingEventListener> = Arc::new(move |event: NamingChangeEvent| {
            sink.lock().unwrap().push(event);
        });
        (listener, events)
    }

    fn sizes(events: &Events) -> Vec<usize> {
        events.lock().unwrap().iter().map(|e| e.instances.len()).collect()
    }

    #[test]
    fn test_register_is_idempotent() {
        common::setup_log();
        let server = MockNacosServer::new();
        let client = NamingClientBuilder::new(common::options("naming-register"))
            .transport(server.clone())
            .build()
            .unwrap();

        let instance = NacosServiceInstance::new("127.0.0.1", 8080).add_metadata("netType", "external");
        client
            .register_instance("todo-service", "LOVE", instance.clone())
            .unwrap();
        client
            .register_instance("todo-service", "LOVE", instance.clone().weight(2.0))
            .unwrap();

        let instances = client
            .get_all_instances("todo-service", "LOVE", Vec::new(), false)
            .unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].ip, "127.0.0.1");
        assert_eq!(instances[0].port, 8080);
        assert_eq!(instances[0].weight, 2.0);
        assert_eq!(instances[0].metadata.get("netType").map(String::as_str), Some("external"));

        client
            .deregister_instance("todo-service", "LOVE", instance)
            .unwrap();
        assert!(server.instances("LOVE", "todo-service").is_empty());
    }

    #[test]
    fn test_unknown_service_is_empty() {
        let server = MockNacosServer::new();
        let client = NamingClientBuilder::new(common::options("naming-empty"))
            .transport(server)
            .build()
            .unwrap();

        let subscribed = client
            .get_all_instances("no-such-service", "LOVE", Vec::new(), true)
            .unwrap();
        assert!(subscribed.is_empty());
        let queried = client
            .get_all_instances("no-such-service", "LOVE", Vec::new(), false)
            .unwrap();
        assert!(queried.is_empty());
    }

    #[test]
    fn test_invalid_arguments() {
        let server = MockNacosServer::new();
        let client = NamingClientBuilder::new(common::options("naming-invalid"))
            .transport(server.clone())
            .build()
            .unwrap();

        let ret = client.register_instance("todo-service", "LOVE", NacosServiceInstance::new("127.0.0.1", 0));
        assert!(matches!(ret, Err(Error::Validation(_))));
        let ret = client.register_instance("", "LOVE", NacosServiceInstance::new("127.0.0.1", 8080));
        assert!(matches!(ret, Err(Error::Validation(_))));
        let ret = client.batch_register_instance("todo-service", "LOVE", Vec::new());
        assert!(matches!(ret, Err(Error::Validation(_))));
        assert_eq!(server.request_count("InstanceRequest"), 0);
        assert_eq!(server.request_count("BatchInstanceRequest"), 0);
    }

    #[tokio::test]
    async fn test_batch_register_pushes_once() {
        common::setup_log();
        let server = MockNacosServer::new();
        let client = NamingClientBuilder::new(common::options("naming-batch").naming_push_empty_protection(false))
            .transport(server.clone())
            .build_async()
            .await
            .unwrap();
        let (listener, events) = recording_listener();

        client
            .subscribe("todo-service", "LOVE", Vec::new(), listener)
            .await
            .unwrap();
        assert!(wait_until(Duration::from_secs(3), || sizes(&events) == vec![0]).await);

        let instances = vec![
            NacosServiceInstance::new("127.0.0.1", 8080),
            NacosServiceInstance::new("127.0.0.1", 8081),
            NacosServiceInstance::new("127.0.0.2", 8080).cluster_name("OTHER"),
        ];
        client
            .batch_register_instance("todo-service", "LOVE", instances)
            .await
            .unwrap();

        assert!(wait_until(Duration::from_secs(3), || sizes(&events) == vec![0, 3]).await);
        assert_eq!(server.push_count("NotifySubscriberRequest"), 1);

        let event = events.lock().unwrap()[1].clone();
        assert_eq!(event.service_name, "todo-service");
        assert_eq!(event.group_name, "LOVE");

        let cached = client
            .get_all_instances("todo-service", "LOVE", Vec::new(), true)
            .await
            .unwrap();
        assert_eq!(cached.len(), 3);
    }

    #[tokio::test]
    async fn test_empty_push_ignored_with_protection() {
        let server = MockNacosServer::new();
        let client = NamingClientBuilder::new(common::options("naming-protect").naming_push_empty_protection(true))
            .transport(server.clone())
            .build_async()
            .await
            .unwrap();
        let (listener, events) = recording_listener();
        let instance = NacosServiceInstance::new("127.0.0.1", 8080);

        client
            .register_instance("todo-service", "LOVE", instance.clone())
            .await
            .unwrap();
        client
            .subscribe("todo-service", "LOVE", Vec::new(), listener)
            .await
            .unwrap();
        assert!(wait_until(Duration::from_secs(3), || sizes(&events) == vec![1]).await);

        client
            .deregister_instance("todo-service", "LOVE", instance)
            .await
            .unwrap();
        assert!(wait_until(Duration::from_secs(3), || server.push_count("NotifySubscriberRequest") >= 1).await);
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(sizes(&events), vec![1]);
        let cached = client
            .get_all_instances("todo-service", "LOVE", Vec::new(), true)
            .await
            .unwrap();
        assert_eq!(cached.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_push_applied_without_protection() {
        let server = MockNacosServer::new();
        let client = NamingClientBuilder::new(common::options("naming-no-protect").naming_push_empty_protection(false))
            .transport(server.clone())
            .build_async()
            .await
            .unwrap();
        let (listener, events) = recording_listener();
        let instance = NacosServiceInstance::new("127.0.0.1", 8080);

        client
            .register_instance("todo-service", "LOVE", instance.clone())
            .await
            .unwrap();
        client
            .subscribe("todo-service", "LOVE", Vec::new(), listener)
            .await
            .unwrap();
        client
            .deregister_instance("todo-service", "LOVE", instance)
            .await
            .unwrap();

        assert!(wait_until(Duration::from_secs(3), || sizes(&events) == vec![1, 0]).await);
        let cached = client
            .get_all_instances("todo-service", "LOVE", Vec::new(), true)
            .await
            .unwrap();
        assert!(cached.is_empty());
    }

    #[tokio::test]
    async fn test_select_healthy_instances() {
        let server = MockNacosServer::new();
        let client = NamingClientBuilder::new(common::options("naming-select"))
            .transport(server.clone())
            .build_async()
            .await
            .unwrap();

        client
            .batch_register_instance(
                "todo-service",
                "LOVE",
                vec![
                    NacosServiceInstance::new("127.0.0.1", 8080),
                    NacosServiceInstance::new("127.0.0.1", 8081).healthy(false),
                    NacosServiceInstance::new("127.0.0.1", 8082).enabled(false),
                ],
            )
            .await
            .unwrap();

        let healthy = client
            .select_instances("todo-service", "LOVE", Vec::new(), false, true)
            .await
            .unwrap();
        assert_eq!(healthy.len(), 1);
        assert_eq!(healthy[0].port, 8080);

        let unhealthy = client
            .select_instances("todo-service", "LOVE", Vec::new(), false, false)
            .await
            .unwrap();
        assert_eq!(unhealthy.len(), 1);
        assert_eq!(unhealthy[0].port, 8081);

        for _ in 0..5 {
            let one = client
                .select_one_healthy_instance("todo-service", "LOVE", Vec::new(), true)
                .await
                .unwrap();
            assert_eq!(one.port, 8080);
        }

        let ret = client
            .select_one_healthy_instance("no-such-service", "LOVE", Vec::new(), false)
            .await;
        assert!(matches!(ret, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_clusters_filter_subscription() {
        let server = MockNacosServer::new();
        let client = NamingClientBuilder::new(common::options("naming-clusters"))
            .transport(server.clone())
            .build_async()
            .await
            .unwrap();
        client
            .batch_register_instance(
                "todo-service",
                "LOVE",
                vec![
                    NacosServiceInstance::new("127.0.0.1", 8080),
                    NacosServiceInstance::new("127.0.0.1", 8081).cluster_name("OTHER"),
                ],
            )
            .await
            .unwrap();

        let other = client
            .get_all_instances("todo-service", "LOVE", vec!["OTHER".to_string()], true)
            .await
            .unwrap();
        assert_eq!(other.len(), 1);
        assert_eq!(other[0].cluster_name, "OTHER");

        let all = client
            .get_all_instances("todo-service", "LOVE", Vec::new(), true)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_unsubscribe_cancels_server_subscription() {
        let server = MockNacosServer::new();
        let client = NamingClientBuilder::new(common::options("naming-unsubscribe"))
            .transport(server.clone())
            .build_async()
            .await
            .unwrap();
        let (first, first_events) = recording_listener();
        let (second, _) = recording_listener();

        client
            .register_instance("todo-service", "LOVE", NacosServiceInstance::new("127.0.0.1", 8080))
            .await
            .unwrap();
        client
            .subscribe("todo-service", "LOVE", Vec::new(), first.clone())
            .await
            .unwrap();
        client
            .subscribe("todo-service", "LOVE", Vec::new(), second.clone())
            .await
            .unwrap();
        assert_eq!(server.subscriber_count("LOVE", "todo-service"), 1);

        client
            .unsubscribe("todo-service", "LOVE", Vec::new(), first)
            .await
            .unwrap();
        assert_eq!(server.subscriber_count("LOVE", "todo-service"), 1);
        client
            .unsubscribe("todo-service", "LOVE", Vec::new(), second)
            .await
            .unwrap();
        assert_eq!(server.subscriber_count("LOVE", "todo-service"), 0);

        client
            .register_instance("todo-service", "LOVE", NacosServiceInstance::new("127.0.0.1", 8081))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(sizes(&first_events), vec![1]);
    }

    #[test]
    fn test_empty_subscribe_answer_is_cached() {
        let server = MockNacosServer::new();
        let client = NamingClientBuilder::new(common::options("naming-empty-cached").naming_push_empty_protection(true))
            .transport(server.clone())
            .build()
            .unwrap();

        for _ in 0..3 {
            let instances = client
                .get_all_instances("no-such-service", "LOVE", Vec::new(), true)
                .unwrap();
            assert!(instances.is_empty());
        }
        assert_eq!(server.request_count("SubscribeServiceRequest"), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_unknown_listener_keeps_subscription() {
        let server = MockNacosServer::new();
        let client = NamingClientBuilder::new(common::options("naming-unsubscribe-unknown"))
            .transport(server.clone())
            .build_async()
            .await
            .unwrap();
        let (stranger, _) = recording_listener();

        client
            .register_instance("todo-service", "LOVE", NacosServiceInstance::new("127.0.0.1", 8080))
            .await
            .unwrap();
        client
            .get_all_instances("todo-service", "LOVE", Vec::new(), true)
            .await
            .unwrap();
        assert_eq!(server.subscriber_count("LOVE", "todo-service"), 1);

        client
            .unsubscribe("todo-service", "LOVE", Vec::new(), stranger)
            .await
            .unwrap();
        assert_eq!(server.subscriber_count("LOVE", "todo-service"), 1);
        assert_eq!(server.request_count("SubscribeServiceRequest"), 1);
    }

    #[tokio::test]
    async fn test_clients_of_one_session_share_subscriptions() {
        let server = MockNacosServer::new();
        let options = common::options("naming-shared-subscribe");
        let a = NamingClientBuilder::new(options.clone())
            .transport(server.clone())
            .build_async()
            .await
            .unwrap();
        let b = NamingClientBuilder::new(options)
            .transport(server.clone())
            .build_async()
            .await
            .unwrap();
        assert_eq!(server.opened(), 1);
        let (a_listener, a_events) = recording_listener();
        let (b_listener, _) = recording_listener();

        a.register_instance("todo-service", "LOVE", NacosServiceInstance::new("127.0.0.1", 8080))
            .await
            .unwrap();
        a.subscribe("todo-service", "LOVE", Vec::new(), a_listener)
            .await
            .unwrap();
        b.subscribe("todo-service", "LOVE", Vec::new(), b_listener.clone())
            .await
            .unwrap();
        assert!(wait_until(Duration::from_secs(3), || sizes(&a_events) == vec![1]).await);

        b.unsubscribe("todo-service", "LOVE", Vec::new(), b_listener)
            .await
            .unwrap();
        assert_eq!(server.subscriber_count("LOVE", "todo-service"), 1);

        b.register_instance("todo-service", "LOVE", NacosServiceInstance::new("127.0.0.1", 8081))
            .await
            .unwrap();
        assert!(wait_until(Duration::from_secs(3), || sizes(&a_events) == vec![1, 2]).await);
        let cached = a
            .get_all_instances("todo-service", "LOVE", Vec::new(), true)
            .await
            .unwrap();
        assert_eq!(cached.len(), 2);

        // the last holder of the subscription cancels it when closed
        drop(a);
        assert!(wait_until(Duration::from_secs(3), || server.subscriber_count("LOVE", "todo-service") == 0).await);
    }

    #[tokio::test]
    async fn test_registration_and_subscription_replayed() {
        common::setup_log();
        let server = MockNacosServer::new();
        let client = NamingClientBuilder::new(common::options("naming-redo"))
            .transport(server.clone())
            .build_async()
            .await
            .unwrap();
        let (listener, events) = recording_listener();

        client
            .register_instance("todo-service", "LOVE", NacosServiceInstance::new("127.0.0.1", 8080))
            .await
            .unwrap();
        client
            .batch_register_instance(
                "todo-batch",
                "LOVE",
                vec![
                    NacosServiceInstance::new("127.0.0.1", 9090),
                    NacosServiceInstance::new("127.0.0.1", 9091),
                ],
            )
            .await
            .unwrap();
        client
            .subscribe("todo-service", "LOVE", Vec::new(), listener)
            .await
            .unwrap();
        assert!(wait_until(Duration::from_secs(3), || sizes(&events) == vec![1]).await);

        server.kill_links();
        assert!(server.instances("LOVE", "todo-service").is_empty());

        assert!(
            wait_until(Duration::from_secs(8), || {
                server.instances("LOVE", "todo-service").len() == 1
                    && server.instances("LOVE", "todo-batch").len() == 2
                    && server.subscriber_count("LOVE", "todo-service") == 1
            })
            .await
        );

        // another session registers, the replayed subscription hears it
        let other = NamingClientBuilder::new(common::options("naming-redo").app_name("todo-other-app"))
            .transport(server.clone())
            .build_async()
            .await
            .unwrap();
        other
            .register_instance("todo-service", "LOVE", NacosServiceInstance::new("127.0.0.2", 8080))
            .await
            .unwrap();
        assert!(wait_until(Duration::from_secs(3), || sizes(&events).last() == Some(&2)).await);
    }
}
