//! # Notification Flows
//!
//! Notifications built from wire payloads and sent through the same backend
//! the store syncs against.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use compliance_store::RecordPatch;
    use compliance_types::{ComplianceStatus, ComplianceTier, RecordId, UserRole};
    use notifications::{
        Branding, Notification, NotificationDispatcher, NotificationError, NotificationKind,
        SEND_NOTIFICATION_FUNCTION,
    };
    use parking_lot::Mutex;
    use remote_gateway::{GatewayError, GatewayOp, RemoteGateway};
    use serde_json::{json, Value};

    use crate::integration::support::{seeded_gateway, store_over, USER};

    #[tokio::test]
    async fn test_approval_notice_after_record_update() {
        let gateway = seeded_gateway();
        let outbox: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = outbox.clone();
        gateway.register_function(SEND_NOTIFICATION_FUNCTION, move |body| {
            sink.lock().push(body);
            Ok(json!({"queued": true}))
        });

        let store = store_over(&gateway);
        store
            .initialize(USER, UserRole::AP, ComplianceTier::Basic)
            .await
            .unwrap();
        let record = store
            .update_compliance_record(
                &RecordId::from("r2"),
                RecordPatch::new().status(ComplianceStatus::Compliant),
            )
            .await
            .unwrap();
        assert!(record.is_compliant());

        let port: Arc<dyn RemoteGateway> = gateway.clone();
        let dispatcher = NotificationDispatcher::new(port, Branding::default());
        let notice = Notification::from_payload(
            "certificate_approved",
            json!({
                "recipient_name": USER,
                "course_name": record.metric_id,
                "certificate_url": format!("https://portal.test/certs/{}", record.id),
            }),
        )
        .unwrap();
        assert_eq!(notice.kind(), NotificationKind::CertificateApproved);

        let response = dispatcher.send("u1@example.com", &notice).await.unwrap();
        assert_eq!(response["queued"], true);

        let sent = outbox.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["type"], "CERTIFICATE_APPROVED");
        assert_eq!(sent[0]["subject"], "Your cpr certificate is ready");
        assert!(sent[0]["text"].as_str().unwrap().contains("/certs/r2"));
    }

    #[tokio::test]
    async fn test_unknown_tag_sends_generic() {
        let gateway = seeded_gateway();
        gateway.register_function(SEND_NOTIFICATION_FUNCTION, |_| Ok(Value::Null));
        let dispatcher = NotificationDispatcher::new(gateway.clone(), Branding::default());

        let notice = Notification::from_payload(
            "REMINDER",
            json!({"subject": "Renew your CPR", "body": "Your CPR expires soon."}),
        )
        .unwrap();
        assert_eq!(notice.kind(), NotificationKind::Generic);

        dispatcher.send("ada@example.com", &notice).await.unwrap();
        let invocations = gateway.invocations();
        assert_eq!(invocations[0].1["type"], "GENERIC");
        assert_eq!(invocations[0].1["subject"], "Renew your CPR");
    }

    #[tokio::test]
    async fn test_payload_and_gateway_errors() {
        let err = Notification::from_payload("WELCOME", json!({"login_url": "https://x.test"}))
            .unwrap_err();
        assert!(matches!(
            err,
            NotificationError::Payload {
                kind: NotificationKind::Welcome,
                ..
            }
        ));

        // No delivery function registered.
        let gateway = seeded_gateway();
        let dispatcher = NotificationDispatcher::new(gateway.clone(), Branding::default());
        let notice = Notification::from_payload(
            "WELCOME",
            json!({"recipient_name": "Ada", "login_url": "https://x.test"}),
        )
        .unwrap();
        let err = dispatcher.send("ada@example.com", &notice).await.unwrap_err();
        assert!(matches!(err, NotificationError::Dispatch(GatewayError::NotFound(_))));
        assert_eq!(gateway.call_count(GatewayOp::Invoke), 1);
    }
}
