//! Customer notifications - order confirmation and status update emails.
//!
//! Messages are rendered with Tera (HTML, autoescaped) plus a plain-text body,
//! then handed to a [`Notifier`]. The only notifier shipped is [`LogNotifier`],
//! which writes the email to the log instead of delivering it.
//!
//! Sending never fails the business operation that triggered it: errors are
//! logged and reported as `false`.

use crate::{
    config::settings::EmailSettings,
    core::order::OrderDetails,
    entities::OrderStatus,
    errors::Result,
};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tera::{Context, Tera};
use tracing::{error, info};

const CONFIRMATION_TEMPLATE: &str =
    include_str!("../../templates/email/order_confirmation.html.tera");
const STATUS_TEMPLATE: &str = include_str!("../../templates/email/status_update.html.tera");

/// A rendered email, ready to hand to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    /// `Name <address>` of the sender
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Delivers rendered emails.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers one message.
    async fn send(&self, message: EmailMessage) -> Result<()>;
}

/// Simulation transport: logs the message instead of sending it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: EmailMessage) -> Result<()> {
        info!(
            from = %message.from,
            to = %message.to,
            subject = %message.subject,
            "Email (simulation mode)\n{}",
            message.text
        );
        Ok(())
    }
}

#[derive(Serialize)]
struct LineView {
    name: String,
    quantity: i32,
    unit_price: String,
    total: String,
}

#[derive(Serialize)]
struct ConfirmationView {
    store_name: String,
    currency: String,
    order_id: i64,
    ordered_at: String,
    status: String,
    client_name: String,
    client_email: String,
    client_phone: Option<String>,
    address: Option<String>,
    lines: Vec<LineView>,
    total: String,
}

#[derive(Serialize)]
struct TrackingView {
    number: String,
    carrier: String,
    estimated_delivery: Option<String>,
}

#[derive(Serialize)]
struct StatusView {
    store_name: String,
    storefront_url: String,
    order_id: i64,
    client_name: String,
    previous_status: String,
    new_status: String,
    headline: String,
    tracking: Option<TrackingView>,
}

fn tracking_view(details: &OrderDetails) -> Option<TrackingView> {
    let order = &details.order;
    match (&order.tracking_number, &order.carrier) {
        (Some(number), Some(carrier)) => Some(TrackingView {
            number: number.clone(),
            carrier: carrier.clone(),
            estimated_delivery: order
                .estimated_delivery_at
                .map(|at| at.format("%Y-%m-%d").to_string()),
        }),
        _ => None,
    }
}

/// Customer-facing sentence describing a status.
#[must_use]
pub fn status_headline(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Confirmed => {
            "Votre paiement a été confirmé et votre commande est maintenant en cours de préparation."
        }
        OrderStatus::Processing => "Votre commande est en cours de préparation dans notre entrepôt.",
        OrderStatus::Shipped => "Votre commande a été expédiée !",
        OrderStatus::Delivered => {
            "Votre commande a été livrée avec succès. Merci pour votre confiance !"
        }
        OrderStatus::Cancelled => {
            "Votre commande a été annulée. Pour toute question, n'hésitez pas à nous contacter."
        }
        OrderStatus::Pending | OrderStatus::Paid => "Le statut de votre commande a été mis à jour.",
    }
}

/// Renders order emails and sends them through a [`Notifier`].
#[derive(Clone)]
pub struct OrderMailer {
    notifier: Arc<dyn Notifier>,
    settings: EmailSettings,
}

impl OrderMailer {
    pub fn new(notifier: Arc<dyn Notifier>, settings: EmailSettings) -> Self {
        Self { notifier, settings }
    }

    fn sender(&self) -> String {
        format!("{} <{}>", self.settings.from_name, self.settings.from)
    }

    fn recipient(details: &OrderDetails) -> Option<(String, String)> {
        details
            .client
            .as_ref()
            .map(|c| (c.name.clone(), c.email.clone()))
    }

    /// Builds the confirmation email for an order.
    ///
    /// # Errors
    /// Returns a template error if rendering fails.
    pub fn confirmation_email(&self, details: &OrderDetails) -> Result<EmailMessage> {
        let order = &details.order;
        let currency = self.settings.currency_label.clone();
        let (client_name, client_email) = Self::recipient(details).unwrap_or_default();

        let view = ConfirmationView {
            store_name: self.settings.store_name.clone(),
            currency: currency.clone(),
            order_id: order.id,
            ordered_at: order.ordered_at.format("%d/%m/%Y %H:%M").to_string(),
            status: order.status.to_string(),
            client_name: client_name.clone(),
            client_email: client_email.clone(),
            client_phone: details.client.as_ref().and_then(|c| c.phone.clone()),
            address: details.shipping_address.as_ref().map(|a| a.one_line()),
            lines: details
                .lines
                .iter()
                .map(|l| LineView {
                    name: l.product_name.clone(),
                    quantity: l.line.quantity,
                    unit_price: format!("{:.2}", l.line.unit_price),
                    total: format!("{:.2}", l.line_total),
                })
                .collect(),
            total: format!("{:.2}", order.total),
        };
        let html = Tera::one_off(CONFIRMATION_TEMPLATE, &Context::from_serialize(&view)?, true)?;

        let mut text = format!(
            "Bonjour {client_name},\n\nVotre commande #{} a été confirmée.\n\n",
            order.id
        );
        for line in &view.lines {
            text.push_str(&format!(
                "- {} x{} : {} {currency}\n",
                line.name, line.quantity, line.total
            ));
        }
        text.push_str(&format!(
            "\nTotal : {} {currency}\n\nMerci d'avoir choisi {} !\n",
            view.total, self.settings.store_name
        ));

        Ok(EmailMessage {
            from: self.sender(),
            to: client_email,
            subject: format!(
                "Confirmation de commande #{} - {}",
                order.id, self.settings.store_name
            ),
            text,
            html,
        })
    }

    /// Builds the status update email for an order that moved from `previous` to `new`.
    ///
    /// # Errors
    /// Returns a template error if rendering fails.
    pub fn status_email(
        &self,
        details: &OrderDetails,
        previous: Option<OrderStatus>,
        new: OrderStatus,
    ) -> Result<EmailMessage> {
        let order = &details.order;
        let (client_name, client_email) = Self::recipient(details).unwrap_or_default();
        let previous = previous.map_or_else(|| "-".to_string(), |s| s.to_string());
        let tracking = if new == OrderStatus::Shipped {
            tracking_view(details)
        } else {
            None
        };

        let mut text = format!(
            "Bonjour {client_name},\n\nCommande #{} : {previous} -> {new}\n\n{}\n",
            order.id,
            status_headline(new)
        );
        if let Some(tracking) = &tracking {
            text.push_str(&format!(
                "\nNuméro de suivi : {}\nTransporteur : {}\n",
                tracking.number, tracking.carrier
            ));
            if let Some(estimated) = &tracking.estimated_delivery {
                text.push_str(&format!("Livraison estimée : {estimated}\n"));
            }
        }

        let view = StatusView {
            store_name: self.settings.store_name.clone(),
            storefront_url: self.settings.storefront_url.clone(),
            order_id: order.id,
            client_name,
            previous_status: previous,
            new_status: new.to_string(),
            headline: status_headline(new).to_string(),
            tracking,
        };
        let html = Tera::one_off(STATUS_TEMPLATE, &Context::from_serialize(&view)?, true)?;

        Ok(EmailMessage {
            from: self.sender(),
            to: client_email,
            subject: format!(
                "Mise à jour du statut - Commande #{} - {}",
                order.id, self.settings.store_name
            ),
            text,
            html,
        })
    }

    async fn deliver(&self, order_id: i64, message: Result<EmailMessage>) -> bool {
        let message = match message {
            Ok(message) if message.to.is_empty() => {
                error!(order_id, "Order has no client email, notification skipped");
                return false;
            }
            Ok(message) => message,
            Err(e) => {
                error!(order_id, error = %e, "Failed to render email");
                return false;
            }
        };

        let to = message.to.clone();
        match self.notifier.send(message).await {
            Ok(()) => {
                info!(order_id, to = %to, "Notification sent");
                true
            }
            Err(e) => {
                error!(order_id, to = %to, error = %e, "Failed to send notification");
                false
            }
        }
    }

    /// Sends the confirmation email. Returns whether it went out.
    pub async fn send_confirmation(&self, details: &OrderDetails) -> bool {
        self.deliver(details.order.id, self.confirmation_email(details))
            .await
    }

    /// Sends the status update email. Returns whether it went out.
    pub async fn send_status_update(
        &self,
        details: &OrderDetails,
        previous: Option<OrderStatus>,
        new: OrderStatus,
    ) -> bool {
        self.deliver(details.order.id, self.status_email(details, previous, new))
            .await
    }
}
