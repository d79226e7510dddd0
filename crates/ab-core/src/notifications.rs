//! Outbound email content. Transport lives behind the [`Mailer`](crate::traits::Mailer) port.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl EmailMessage {
    /// Sent to the owner right after an ad is first saved.
    pub fn ad_created(from: &str, to: &str, username: &str, ad_title: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            subject: "Ad Created Successfully!".to_string(),
            body: format!(
                "Dear {username},\n\nYour ad '{ad_title}' has been successfully posted!"
            ),
        }
    }

    pub fn registration(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            subject: "Registration Email".to_string(),
            body: "Thank you for joining the board".to_string(),
        }
    }

    pub fn promo(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            subject: "Discover new possibilities!".to_string(),
            body: "Explore the board! Sell what you no longer need and find what you do."
                .to_string(),
        }
    }
}
