//! Checkout route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::Form;
use axum::extract::State;
use boutique_core::{Address, CreditCardInfo, Email, PlaceOrderRequest, ProductId};
use serde::Deserialize;
use tracing::instrument;

use super::cart::order_total;
use super::shop::{PageContext, ProductView, Visitor, recommendations};
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Checkout form data. Every field arrives as text and is validated here.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CheckoutForm {
    pub email: String,
    pub street_address: String,
    pub zip_code: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub credit_card_number: String,
    pub credit_card_expiration_month: String,
    pub credit_card_expiration_year: String,
    pub credit_card_cvv: String,
}

fn required<'a>(value: &'a str, field: &str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::BadRequest(format!("{field} is required")));
    }
    Ok(value)
}

fn number(value: &str, field: &str) -> Result<u32> {
    required(value, field)?
        .parse::<u32>()
        .map_err(|_| AppError::BadRequest(format!("{field} must be a number")))
}

impl CheckoutForm {
    /// Validate the form into a place-order request for `visitor`.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` naming the first invalid field.
    pub fn validate(&self, visitor: &Visitor) -> Result<PlaceOrderRequest> {
        let email = Email::parse(&self.email)
            .map_err(|e| AppError::BadRequest(format!("invalid email: {e}")))?;

        let address = Address {
            street_address: required(&self.street_address, "street address")?.to_string(),
            city: required(&self.city, "city")?.to_string(),
            state: required(&self.state, "state")?.to_string(),
            country: required(&self.country, "country")?.to_string(),
            zip_code: number(&self.zip_code, "zip code")?,
        };

        let card_number: String = required(&self.credit_card_number, "credit card number")?
            .chars()
            .filter(|c| !matches!(c, '-' | ' '))
            .collect();
        if !(12..=19).contains(&card_number.len()) || !card_number.chars().all(|c| c.is_ascii_digit())
        {
            return Err(AppError::BadRequest(
                "credit card number must be 12 to 19 digits".to_string(),
            ));
        }

        let expiration_month = number(&self.credit_card_expiration_month, "expiration month")?;
        if !(1..=12).contains(&expiration_month) {
            return Err(AppError::BadRequest(
                "expiration month must be between 1 and 12".to_string(),
            ));
        }

        Ok(PlaceOrderRequest {
            user_id: visitor.session_id.clone(),
            user_currency: visitor.currency.clone(),
            address,
            email,
            credit_card: CreditCardInfo {
                number: card_number,
                cvv: number(&self.credit_card_cvv, "cvv")?,
                expiration_year: number(&self.credit_card_expiration_year, "expiration year")?,
                expiration_month,
            },
        })
    }
}

/// Order confirmation template.
#[derive(Template, WebTemplate)]
#[template(path = "pages/order.html")]
pub struct OrderTemplate {
    pub page: PageContext,
    pub order_id: String,
    pub tracking_id: String,
    pub total_paid: String,
    pub recommendations: Vec<ProductView>,
}

/// Place the order and show the confirmation.
#[instrument(skip(state, visitor, form))]
pub async fn place_order(
    State(state): State<AppState>,
    visitor: Visitor,
    Form(form): Form<CheckoutForm>,
) -> Result<OrderTemplate> {
    let request = form.validate(&visitor)?;
    tracing::info!(
        email_domain = request.email.domain(),
        card = ?request.credit_card,
        "Placing order"
    );

    let order = state.services().checkout.place_order(request).await?;
    tracing::info!(order_id = %order.order_id, "Order placed");

    let total = order_total(
        &order.shipping_cost,
        order.items.iter().map(|line| (&line.cost, line.item.quantity)),
    )?;

    let ordered: Vec<ProductId> = order
        .items
        .iter()
        .map(|line| line.item.product_id.clone())
        .collect();
    let recommendations = recommendations(&state, &visitor, &ordered).await;
    let page = PageContext::load(&state, &visitor).await?;

    Ok(OrderTemplate {
        page,
        order_id: order.order_id.to_string(),
        tracking_id: order.shipping_tracking_id.to_string(),
        total_paid: total.to_string(),
        recommendations,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use boutique_core::{CurrencyCode, SessionId};

    use super::*;

    fn visitor() -> Visitor {
        Visitor {
            session_id: SessionId::generate(),
            currency: CurrencyCode::parse("EUR").unwrap(),
        }
    }

    fn filled() -> CheckoutForm {
        CheckoutForm {
            email: "someone@example.com".to_string(),
            street_address: "1600 Amphitheatre Parkway".to_string(),
            zip_code: "94043".to_string(),
            city: "Mountain View".to_string(),
            state: "CA".to_string(),
            country: "United States".to_string(),
            credit_card_number: "4432-8015-6152-0454".to_string(),
            credit_card_expiration_month: "1".to_string(),
            credit_card_expiration_year: "2030".to_string(),
            credit_card_cvv: "672".to_string(),
        }
    }

    #[test]
    fn test_valid_form() {
        let visitor = visitor();
        let request = filled().validate(&visitor).unwrap();
        assert_eq!(request.user_id, visitor.session_id);
        assert_eq!(request.user_currency.as_str(), "EUR");
        assert_eq!(request.address.zip_code, 94043);
        assert_eq!(request.credit_card.number, "4432801561520454");
        assert_eq!(request.credit_card.last_four(), "0454");
    }

    #[test]
    fn test_invalid_fields() {
        let cases: [fn(&mut CheckoutForm); 5] = [
            |f| f.email = "not-an-email".to_string(),
            |f| f.zip_code = "9404a".to_string(),
            |f| f.city = "  ".to_string(),
            |f| f.credit_card_number = "1234".to_string(),
            |f| f.credit_card_expiration_month = "13".to_string(),
        ];
        for mutate in cases {
            let mut form = filled();
            mutate(&mut form);
            assert!(matches!(
                form.validate(&visitor()),
                Err(AppError::BadRequest(_))
            ));
        }
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        let form: CheckoutForm = serde_json::from_str(r#"{"email":"a@b.c"}"#).unwrap();
        assert!(form.validate(&visitor()).is_err());
    }
}
