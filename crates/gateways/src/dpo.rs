//! Redirect-token adapter (DPO Group API3G, XML over HTTP).

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use paybook_payments::PaymentMethodConfig;
use paybook_vault::Vault;

use crate::error::GatewayError;
use crate::gateway::{PaymentGateway, open_secret};
use crate::http::{read_body, trim_base};
use crate::types::{GatewayKind, InitiateRequest, Initiation, PaymentNotice, PaymentStatus, Verification};

const SANDBOX_HOST: &str = "https://secure1.sandbox.directpay.online";
const PRODUCTION_HOST: &str = "https://secure.directpay.online";
const DEFAULT_SERVICE_TYPE: &str = "4131";
const RESULT_OK: &str = "000";
const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="utf-8"?>"#;

#[derive(Clone)]
pub struct DpoGateway {
    http: Client,
    host: String,
    company_token: String,
    service_type: String,
}

impl core::fmt::Debug for DpoGateway {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DpoGateway")
            .field("host", &self.host)
            .field("service_type", &self.service_type)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename = "API3G", rename_all = "PascalCase")]
struct CreateTokenRequest<'a> {
    company_token: &'a str,
    request: &'static str,
    transaction: TransactionXml<'a>,
    services: ServicesXml<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct TransactionXml<'a> {
    #[serde(with = "rust_decimal::serde::str")]
    payment_amount: Decimal,
    payment_currency: String,
    company_ref: &'a str,
    #[serde(rename = "RedirectURL")]
    redirect_url: &'a str,
    #[serde(rename = "BackURL")]
    back_url: &'a str,
    company_ref_unique: u8,
    #[serde(rename = "PTL")]
    ptl: u8,
}

#[derive(Debug, Serialize)]
struct ServicesXml<'a> {
    #[serde(rename = "Service")]
    service: Vec<ServiceXml<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ServiceXml<'a> {
    service_type: &'a str,
    service_description: String,
    service_date: String,
}

#[derive(Debug, Serialize)]
#[serde(rename = "API3G", rename_all = "PascalCase")]
struct VerifyTokenRequest<'a> {
    company_token: &'a str,
    request: &'static str,
    transaction_token: &'a str,
}

/// Any API3G answer; absent elements stay `None`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Api3gResponse {
    result: Option<String>,
    result_explanation: Option<String>,
    trans_token: Option<String>,
    transaction_amount: Option<String>,
    transaction_currency: Option<String>,
    company_ref: Option<String>,
}

fn to_xml<T: Serialize>(body: &T) -> Result<String, GatewayError> {
    let xml = quick_xml::se::to_string(body)
        .map_err(|e| GatewayError::InvalidRequest(format!("DPO request could not be encoded: {e}")))?;
    Ok(format!("{XML_DECLARATION}{xml}"))
}

fn from_xml(body: &str) -> Result<Api3gResponse, GatewayError> {
    quick_xml::de::from_str(body).map_err(|e| GatewayError::Malformed(format!("DPO returned invalid XML: {e}")))
}

impl DpoGateway {
    pub fn new(config: &PaymentMethodConfig, vault: &Vault, http: Client) -> Result<Self, GatewayError> {
        let company_token = open_secret(vault, config.api_key.as_deref())?.ok_or_else(|| {
            GatewayError::Configuration("DPO Company Token (apiKey) is not configured.".into())
        })?;
        let service_type = config
            .setting_str("serviceType")
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SERVICE_TYPE)
            .to_string();
        let default_host = if config.setting_str("mode") == Some("production") {
            PRODUCTION_HOST
        } else {
            SANDBOX_HOST
        };
        let host = trim_base(config.setting_str("baseUrl").unwrap_or(default_host));

        Ok(Self {
            http,
            host,
            company_token,
            service_type,
        })
    }

    fn api_url(&self) -> String {
        format!("{}/API/v6/", self.host)
    }

    /// Hosted payment page for a transaction token.
    pub fn payment_url(&self, token: &str) -> String {
        format!("{}/payv2.php?ID={token}", self.host)
    }

    async fn exchange(&self, xml: String) -> Result<String, GatewayError> {
        let response = self
            .http
            .post(self.api_url())
            .header(reqwest::header::CONTENT_TYPE, "application/xml")
            .body(xml)
            .send()
            .await?;
        let (_, body) = read_body(response).await?;
        Ok(body)
    }
}

#[async_trait]
impl PaymentGateway for DpoGateway {
    fn kind(&self) -> GatewayKind {
        GatewayKind::Dpo
    }

    async fn initiate(&self, request: &InitiateRequest) -> Result<Initiation, GatewayError> {
        let envelope = CreateTokenRequest {
            company_token: &self.company_token,
            request: "createToken",
            transaction: TransactionXml {
                payment_amount: request.amount,
                payment_currency: request.currency.to_uppercase(),
                company_ref: &request.order_id,
                redirect_url: &request.return_url,
                back_url: &request.cancel_url,
                company_ref_unique: 0,
                ptl: 5,
            },
            services: ServicesXml {
                service: vec![ServiceXml {
                    service_type: &self.service_type,
                    service_description: format!("Payment for Order {}", request.order_id),
                    service_date: Utc::now().format("%Y-%m-%d").to_string(),
                }],
            },
        };

        let body = self.exchange(to_xml(&envelope)?).await?;
        let answer = from_xml(&body)?;

        if answer.result.as_deref() != Some(RESULT_OK) {
            let explanation = answer
                .result_explanation
                .unwrap_or_else(|| "Payment initialization failed.".into());
            return Err(GatewayError::Rejected(format!("DPO Error: {explanation}")));
        }
        let token = answer
            .trans_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| GatewayError::Rejected("DPO Error: response carried no TransToken".into()))?;

        let url = self.payment_url(&token);
        Ok(Initiation::redirect(token, url))
    }

    async fn verify(&self, reference: &str) -> Result<Verification, GatewayError> {
        let envelope = VerifyTokenRequest {
            company_token: &self.company_token,
            request: "verifyToken",
            transaction_token: reference,
        };
        let body = self.exchange(to_xml(&envelope)?).await?;

        let answer = from_xml(&body).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "unreadable verifyToken response; treating as failed");
            Api3gResponse::default()
        });
        let status = if answer.result.as_deref() == Some(RESULT_OK) {
            PaymentStatus::Success
        } else {
            PaymentStatus::Failed
        };

        Ok(Verification {
            status,
            amount: answer.transaction_amount.as_deref().and_then(|a| a.trim().parse().ok()),
            currency: answer.transaction_currency,
            order_id: answer.company_ref,
            evidence: body,
        })
    }

    fn verify_inbound_signature(&self, _raw_body: &[u8], _signature: &str, _secret: &str) -> bool {
        false
    }

    fn inbound_secret(&self) -> Option<&str> {
        None
    }

    fn parse_callback(&self, _raw_body: &[u8]) -> Result<Option<PaymentNotice>, GatewayError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_token_envelope_has_api3g_shape() {
        let envelope = CreateTokenRequest {
            company_token: "TOKEN",
            request: "createToken",
            transaction: TransactionXml {
                payment_amount: Decimal::new(1250, 2),
                payment_currency: "KES".into(),
                company_ref: "order-1",
                redirect_url: "https://shop/return?a=1&b=2",
                back_url: "https://shop/back",
                company_ref_unique: 0,
                ptl: 5,
            },
            services: ServicesXml {
                service: vec![ServiceXml {
                    service_type: "4131",
                    service_description: "Payment for Order order-1".into(),
                    service_date: "2026-01-01".into(),
                }],
            },
        };
        let xml = to_xml(&envelope).unwrap();

        assert!(xml.starts_with(XML_DECLARATION));
        assert!(xml.contains("<API3G><CompanyToken>TOKEN</CompanyToken><Request>createToken</Request>"));
        assert!(xml.contains("<PaymentAmount>12.50</PaymentAmount>"));
        assert!(xml.contains("<RedirectURL>https://shop/return?a=1&amp;b=2</RedirectURL>"));
        assert!(xml.contains("<CompanyRefUnique>0</CompanyRefUnique><PTL>5</PTL>"));
        assert!(xml.contains("<Services><Service><ServiceType>4131</ServiceType>"));
    }

    #[test]
    fn parses_result_and_token() {
        let answer = from_xml(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?><API3G><Result>000</Result>\
             <ResultExplanation>Transaction created</ResultExplanation>\
             <TransToken>ABC-123</TransToken><TransRef>R1</TransRef></API3G>",
        )
        .unwrap();
        assert_eq!(answer.result.as_deref(), Some("000"));
        assert_eq!(answer.trans_token.as_deref(), Some("ABC-123"));
    }
}
