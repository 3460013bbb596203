use std::collections::HashMap;
use std::time::Duration;

use axum::routing::{get, post};
use axum::{Form, Json, Router};
use chrono::Utc;
use paybook_core::{DomainError, StoreId};
use paybook_gateways::signature::hmac_sha512_hex;
use paybook_gateways::{
    Gateway, GatewayKind, InitiateRequest, NextStep, PaymentStatus, build_http_client,
};
use paybook_payments::{MethodId, PaymentCategory, PaymentMethodConfig};
use paybook_vault::Vault;
use rust_decimal_macros::dec;
use serde_json::{Map, Value, json};

struct MockProcessor {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl MockProcessor {
    async fn spawn(app: Router) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            base_url: format!("http://{}", addr),
            handle,
        }
    }
}

impl Drop for MockProcessor {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn vault() -> Vault {
    Vault::from_key_bytes([42u8; 32])
}

fn method(gateway: &str, base_url: &str, vault: &Vault) -> PaymentMethodConfig {
    let now = Utc::now();
    let mut settings = Map::new();
    settings.insert("baseUrl".into(), Value::String(base_url.to_string()));
    PaymentMethodConfig {
        id: MethodId::new(format!("pm_{}_1", gateway.to_lowercase())),
        store_id: StoreId::new(),
        name: gateway.to_string(),
        category: PaymentCategory::CreditCard,
        enabled: true,
        coa_code: "1010".into(),
        gateway: Some(gateway.to_string()),
        gateway_account_id: None,
        api_key: Some(vault.encrypt("sk_test_secret").unwrap()),
        webhook_secret: Some(vault.encrypt("whsec_test").unwrap()),
        public_key: None,
        description: None,
        icon: None,
        sort_order: 1,
        settings,
        created_at: now,
        updated_at: now,
    }
}

fn checkout(order_id: &str) -> InitiateRequest {
    InitiateRequest {
        order_id: order_id.to_string(),
        amount: dec!(12.50),
        currency: "kes".into(),
        customer_email: Some("payer@example.com".into()),
        phone_number: Some("0712345678".into()),
        return_url: "https://shop.example/return".into(),
        cancel_url: "https://shop.example/cancel".into(),
        callback_url: "https://shop.example/webhooks/x".into(),
    }
}

fn resolve(config: &PaymentMethodConfig, vault: &Vault) -> Gateway {
    let http = build_http_client(Duration::from_secs(5)).unwrap();
    Gateway::from_config(config, vault, &http).unwrap()
}

#[tokio::test]
async fn dpo_verify_with_non_success_result_is_failed() {
    let app = Router::new().route(
        "/API/v6/",
        post(|| async {
            "<?xml version=\"1.0\" encoding=\"utf-8\"?><API3G><Result>001</Result>\
             <ResultExplanation>Transaction not paid yet</ResultExplanation></API3G>"
        }),
    );
    let srv = MockProcessor::spawn(app).await;
    let v = vault();
    let gateway = resolve(&method("DPO", &srv.base_url, &v), &v);

    let verification = gateway.verify("TOKEN-1").await.unwrap();
    assert_eq!(verification.status, PaymentStatus::Failed);
    assert!(verification.evidence.contains("<Result>001</Result>"));
}

#[tokio::test]
async fn dpo_create_token_redirects_to_hosted_page() {
    let app = Router::new().route(
        "/API/v6/",
        post(|body: String| async move {
            assert!(body.contains("<Request>createToken</Request>"));
            assert!(body.contains("<PaymentCurrency>KES</PaymentCurrency>"));
            assert!(body.contains("<ServiceType>4131</ServiceType>"));
            "<API3G><Result>000</Result><ResultExplanation>Created</ResultExplanation>\
             <TransToken>TT-9</TransToken></API3G>"
        }),
    );
    let srv = MockProcessor::spawn(app).await;
    let v = vault();
    let gateway = resolve(&method("DPO", &srv.base_url, &v), &v);

    let initiation = gateway.initiate(&checkout("order-7")).await.unwrap();
    assert_eq!(initiation.reference, "TT-9");
    assert_eq!(
        initiation.next_step,
        NextStep::Redirect {
            url: format!("{}/payv2.php?ID=TT-9", srv.base_url)
        }
    );
}

#[tokio::test]
async fn dpo_rejection_carries_explanation() {
    let app = Router::new().route(
        "/API/v6/",
        post(|| async {
            "<API3G><Result>801</Result><ResultExplanation>Request missing company token</ResultExplanation></API3G>"
        }),
    );
    let srv = MockProcessor::spawn(app).await;
    let v = vault();
    let gateway = resolve(&method("DPO", &srv.base_url, &v), &v);

    let err = gateway.initiate(&checkout("order-7")).await.unwrap_err();
    assert_eq!(err, DomainError::Gateway("DPO Error: Request missing company token".into()));
}

#[tokio::test]
async fn stripe_checkout_session_uses_minor_units() {
    let app = Router::new()
        .route(
            "/v1/checkout/sessions",
            post(|Form(form): Form<HashMap<String, String>>| async move {
                assert_eq!(form["line_items[0][price_data][unit_amount]"], "1250");
                assert_eq!(form["line_items[0][price_data][currency]"], "kes");
                assert_eq!(form["client_reference_id"], "order-1");
                Json(json!({ "id": "cs_test_1", "url": "https://checkout.stripe.test/cs_test_1" }))
            }),
        )
        .route(
            "/v1/checkout/sessions/cs_test_1",
            get(|| async {
                Json(json!({
                    "id": "cs_test_1",
                    "status": "complete",
                    "payment_status": "paid",
                    "amount_total": 1250,
                    "currency": "kes",
                    "client_reference_id": "order-1"
                }))
            }),
        );
    let srv = MockProcessor::spawn(app).await;
    let v = vault();
    let gateway = resolve(&method("Stripe", &srv.base_url, &v), &v);

    let initiation = gateway.initiate(&checkout("order-1")).await.unwrap();
    assert_eq!(initiation.reference, "cs_test_1");
    assert_eq!(initiation.status, PaymentStatus::Pending);

    let verification = gateway.verify("cs_test_1").await.unwrap();
    assert_eq!(verification.status, PaymentStatus::Success);
    assert_eq!(verification.amount, Some(dec!(12.50)));
    assert_eq!(verification.order_id.as_deref(), Some("order-1"));
}

#[tokio::test]
async fn paystack_refusal_is_a_gateway_error() {
    let app = Router::new().route(
        "/transaction/initialize",
        post(|| async { Json(json!({ "status": false, "message": "Invalid key" })) }),
    );
    let srv = MockProcessor::spawn(app).await;
    let v = vault();
    let gateway = resolve(&method("Paystack", &srv.base_url, &v), &v);

    let err = gateway.initiate(&checkout("order-2")).await.unwrap_err();
    assert_eq!(err, DomainError::Gateway("Paystack Initialization Error: Invalid key".into()));
}

#[tokio::test]
async fn paystack_abandoned_transaction_is_failed() {
    let app = Router::new().route(
        "/transaction/verify/order-3",
        get(|| async {
            Json(json!({
                "status": true,
                "message": "Verification successful",
                "data": { "status": "abandoned", "reference": "order-3", "amount": 5000, "currency": "NGN" }
            }))
        }),
    );
    let srv = MockProcessor::spawn(app).await;
    let v = vault();
    let gateway = resolve(&method("Paystack", &srv.base_url, &v), &v);

    let verification = gateway.verify("order-3").await.unwrap();
    assert_eq!(verification.status, PaymentStatus::Failed);
    assert_eq!(verification.amount, Some(dec!(50)));
}

#[tokio::test]
async fn paystack_webhook_is_authenticated_with_secret_key() {
    let v = vault();
    let gateway = resolve(&method("Paystack", "http://127.0.0.1:9", &v), &v);
    let body = json!({
        "event": "charge.success",
        "data": { "reference": "ref-1", "amount": 250000, "currency": "ngn", "metadata": { "orderId": "order-4" } }
    })
    .to_string();

    let signature = hmac_sha512_hex(b"sk_test_secret", body.as_bytes()).unwrap();
    assert!(gateway.authenticate_callback(body.as_bytes(), Some(&signature)));
    assert!(!gateway.authenticate_callback(body.as_bytes(), Some(&"0".repeat(128))));

    let notice = gateway.parse_callback(body.as_bytes()).unwrap().unwrap();
    assert_eq!(notice.reference, "ref-1");
    assert_eq!(notice.order_id.as_deref(), Some("order-4"));
    assert_eq!(notice.amount, dec!(2500));
    assert_eq!(notice.currency.as_deref(), Some("NGN"));
}

#[tokio::test]
async fn mpesa_push_waits_for_callback() {
    let app = Router::new()
        .route(
            "/oauth/v1/generate",
            get(|| async { Json(json!({ "access_token": "tok", "expires_in": "3599" })) }),
        )
        .route(
            "/mpesa/stkpush/v1/processrequest",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["PhoneNumber"], "254712345678");
                assert_eq!(body["Amount"], 13);
                assert_eq!(body["TransactionType"], "CustomerPayBillOnline");
                Json(json!({
                    "MerchantRequestID": "m-1",
                    "CheckoutRequestID": "ws_CO_1",
                    "ResponseCode": "0",
                    "ResponseDescription": "Success. Request accepted for processing",
                    "CustomerMessage": "Success. Request accepted for processing"
                }))
            }),
        );
    let srv = MockProcessor::spawn(app).await;
    let v = vault();
    let mut config = method("M-Pesa", &srv.base_url, &v);
    config.gateway_account_id = Some("174379".into());
    config.settings.insert("passkey".into(), json!("passkey"));
    let gateway = resolve(&config, &v);
    assert_eq!(gateway.kind(), GatewayKind::Mpesa);

    let initiation = gateway.initiate(&checkout("order-5")).await.unwrap();
    assert_eq!(initiation.reference, "ws_CO_1");
    assert!(matches!(initiation.next_step, NextStep::AwaitApproval { .. }));

    let verification = gateway.verify("ws_CO_1").await.unwrap();
    assert_eq!(verification.status, PaymentStatus::Pending);

    let callback = json!({
        "Body": { "stkCallback": {
            "MerchantRequestID": "m-1",
            "CheckoutRequestID": "ws_CO_1",
            "ResultCode": 0,
            "ResultDesc": "The service request is processed successfully.",
            "CallbackMetadata": { "Item": [
                { "Name": "Amount", "Value": 13 },
                { "Name": "MpesaReceiptNumber", "Value": "NLJ7RT61SV" },
                { "Name": "PhoneNumber", "Value": 254712345678u64 }
            ]}
        }}
    })
    .to_string();
    let notice = gateway.parse_callback(callback.as_bytes()).unwrap().unwrap();
    assert_eq!(notice.status, PaymentStatus::Success);
    assert_eq!(notice.amount, dec!(13));
    assert_eq!(notice.receipt.as_deref(), Some("NLJ7RT61SV"));
}

#[tokio::test]
async fn mpesa_rejected_push_is_gateway_error() {
    let app = Router::new()
        .route("/oauth/v1/generate", get(|| async { Json(json!({ "access_token": "tok" })) }))
        .route(
            "/mpesa/stkpush/v1/processrequest",
            post(|| async {
                Json(json!({ "ResponseCode": "1", "ResponseDescription": "Invalid BusinessShortCode" }))
            }),
        );
    let srv = MockProcessor::spawn(app).await;
    let v = vault();
    let mut config = method("M-Pesa", &srv.base_url, &v);
    config.gateway_account_id = Some("174379".into());
    config.settings.insert("passkey".into(), json!("passkey"));
    let gateway = resolve(&config, &v);

    let err = gateway.initiate(&checkout("order-6")).await.unwrap_err();
    assert_eq!(err, DomainError::Gateway("M-Pesa Error: Invalid BusinessShortCode".into()));
}

#[tokio::test]
async fn slow_processor_leaves_payment_pending() {
    let app = Router::new().route(
        "/transaction/initialize",
        post(|| async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Json(json!({ "status": true, "data": { "authorization_url": "x", "reference": "y" } }))
        }),
    );
    let srv = MockProcessor::spawn(app).await;
    let v = vault();
    let http = build_http_client(Duration::from_millis(50)).unwrap();
    let gateway = Gateway::from_config(&method("Paystack", &srv.base_url, &v), &v, &http).unwrap();

    let initiation = gateway.initiate(&checkout("order-8")).await.unwrap();
    assert_eq!(initiation.status, PaymentStatus::Pending);
    assert_eq!(initiation.reference, "order-8");
    assert_eq!(initiation.next_step, NextStep::NoAction);
}
