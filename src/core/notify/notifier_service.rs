// Notification dispatch - formats outbound emails for domain events and
// hands them to the mail transport through a bounded background queue.
//
// Notifications are strictly best-effort: a full queue or a failing SMTP
// server is logged and swallowed, it never blocks or fails the request
// that triggered the event.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::mpsc;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum MailError {
    #[error("transport error: {0}")]
    Transport(String),
}

// ============================================================================
// TRANSPORT TRAIT (PORT)
// ============================================================================

/// A rendered, ready-to-send plain-text email.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Trait for the outbound mail transport.
///
/// The SMTP implementation lives in infra; tests use a capturing
/// in-memory implementation.
#[async_trait]
pub trait MailTransport: Send + Sync + 'static {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError>;
}

// ============================================================================
// DOMAIN EVENTS
// ============================================================================

/// Every domain event that produces an email to a member.
#[derive(Debug, Clone)]
pub enum Notification {
    RegistrationConfirmed {
        pseudo: String,
        email: String,
    },
    Banned {
        pseudo: String,
        email: String,
        ban_ends_at: DateTime<Utc>,
    },
    PermanentlyBanned {
        pseudo: String,
        email: String,
    },
    Unbanned {
        pseudo: String,
        email: String,
    },
    ReplyPosted {
        pseudo: String,
        email: String,
        content_title: String,
    },
    CommentLiked {
        pseudo: String,
        email: String,
        content_title: String,
    },
    PasswordResetRequested {
        pseudo: String,
        email: String,
        reset_url: String,
    },
    PasswordResetConfirmed {
        pseudo: String,
        email: String,
    },
}

impl Notification {
    pub fn recipient(&self) -> &str {
        match self {
            Notification::RegistrationConfirmed { email, .. }
            | Notification::Banned { email, .. }
            | Notification::PermanentlyBanned { email, .. }
            | Notification::Unbanned { email, .. }
            | Notification::ReplyPosted { email, .. }
            | Notification::CommentLiked { email, .. }
            | Notification::PasswordResetRequested { email, .. }
            | Notification::PasswordResetConfirmed { email, .. } => email,
        }
    }

    /// Render the fixed French template for this event.
    pub fn render(&self) -> EmailMessage {
        let (subject, body) = match self {
            Notification::RegistrationConfirmed { pseudo, .. } => (
                "Confirmation d'inscription".to_string(),
                format!(
                    "Bonjour {pseudo},\n\n\
                     Merci de vous être inscrit sur notre blog. Votre inscription a été \
                     confirmée avec succès.\n\
                     Nous espérons entendre bientôt votre voix dans les commentaires et \
                     sur le forum.\n\n\
                     Cordialement,\nL'équipe du blog."
                ),
            ),
            Notification::Banned {
                pseudo,
                ban_ends_at,
                ..
            } => (
                "Bannissement".to_string(),
                format!(
                    "Bonjour {pseudo},\n\n\
                     Suite au non-respect des règles en vigueur sur le blog, vous avez été \
                     banni pendant une semaine, jusqu'au {}. Si vous ne respectez pas à \
                     nouveau les règles du blog, vous serez banni définitivement.\n\n\
                     Cordialement,\nL'équipe du blog.",
                    ban_ends_at.format("%d/%m/%Y")
                ),
            ),
            Notification::PermanentlyBanned { pseudo, .. } => (
                "Bannissement définitif".to_string(),
                format!(
                    "Bonjour {pseudo},\n\n\
                     Comme nous vous l'avions indiqué dans un précédent mail, en cas de \
                     récidive vous seriez banni définitivement de notre blog. Ce mail \
                     vous confirme que votre compte est désormais définitivement banni. \
                     Nous regrettons cette décision, mais nous ne pouvons tolérer ce \
                     manquement aux règles établies.\n\n\
                     Cordialement,\nL'équipe du blog."
                ),
            ),
            Notification::Unbanned { pseudo, .. } => (
                "Fin de votre bannissement".to_string(),
                format!(
                    "Bonjour {pseudo},\n\n\
                     Votre bannissement est levé : vous pouvez à nouveau vous connecter \
                     et participer au blog. Nous comptons sur vous pour respecter les \
                     règles en vigueur.\n\n\
                     Cordialement,\nL'équipe du blog."
                ),
            ),
            Notification::ReplyPosted {
                pseudo,
                content_title,
                ..
            } => (
                "Nouvelle réponse à votre commentaire".to_string(),
                format!(
                    "Bonjour {pseudo},\n\n\
                     Quelqu'un a répondu à votre commentaire sur \"{content_title}\". \
                     Connectez-vous pour lire la réponse.\n\n\
                     Cordialement,\nL'équipe du blog."
                ),
            ),
            Notification::CommentLiked {
                pseudo,
                content_title,
                ..
            } => (
                "Votre commentaire a été aimé".to_string(),
                format!(
                    "Bonjour {pseudo},\n\n\
                     Un membre a aimé votre commentaire sur \"{content_title}\".\n\n\
                     Cordialement,\nL'équipe du blog."
                ),
            ),
            Notification::PasswordResetRequested {
                pseudo, reset_url, ..
            } => (
                "Réinitialisation de votre mot de passe".to_string(),
                format!(
                    "Bonjour {pseudo},\n\n\
                     Pour réinitialiser votre mot de passe, cliquez sur le lien \
                     suivant : {reset_url}\n\
                     Ce lien expire dans une heure. Si vous n'êtes pas à l'origine de \
                     cette demande, ignorez ce mail.\n\n\
                     Cordialement,\nL'équipe du blog."
                ),
            ),
            Notification::PasswordResetConfirmed { pseudo, .. } => (
                "Confirmation de réinitialisation de mot de passe".to_string(),
                format!(
                    "Bonjour {pseudo},\n\n\
                     Votre mot de passe a été réinitialisé avec succès.\n\n\
                     Cordialement,\nL'équipe du blog."
                ),
            ),
        };

        EmailMessage {
            to: self.recipient().to_string(),
            subject,
            body,
        }
    }
}

// ============================================================================
// DISPATCHER
// ============================================================================

/// Handle to the background notification queue.
///
/// Cloning is cheap (it clones the channel sender); every service that
/// triggers notifications holds one.
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::Sender<Notification>,
}

impl Notifier {
    /// Spawn the worker task draining the queue into the transport and
    /// return the sending handle.
    pub fn spawn<T: MailTransport>(transport: T, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<Notification>(capacity);

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let message = event.render();
                let recipient = message.to.clone();
                if let Err(e) = transport.send(message).await {
                    // Best-effort: log and move on.
                    tracing::error!(%recipient, "Failed to deliver notification email: {}", e);
                }
            }
        });

        Self { tx }
    }

    /// Queue a notification. Never blocks and never fails the caller:
    /// a full or closed queue drops the event with a warning.
    pub fn notify(&self, event: Notification) {
        if let Err(e) = self.tx.try_send(event) {
            tracing::warn!("Notification dropped: {}", e);
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::mail::MemoryMailer;

    // The worker runs on the test's current-thread runtime, so a handful
    // of yields is enough to let it drain the queue.
    async fn drain() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_notification_reaches_transport() {
        let mailer = MemoryMailer::new();
        let notifier = Notifier::spawn(mailer.clone(), 16);

        notifier.notify(Notification::RegistrationConfirmed {
            pseudo: "sakura".to_string(),
            email: "sakura@example.com".to_string(),
        });
        drain().await;

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "sakura@example.com");
        assert_eq!(sent[0].subject, "Confirmation d'inscription");
        assert!(sent[0].body.contains("sakura"));
    }

    #[tokio::test]
    async fn test_transport_failure_is_swallowed() {
        let mailer = MemoryMailer::failing();
        let notifier = Notifier::spawn(mailer.clone(), 16);

        notifier.notify(Notification::Unbanned {
            pseudo: "kenshin".to_string(),
            email: "kenshin@example.com".to_string(),
        });
        drain().await;

        // Nothing recorded, nothing panicked, the handle still works.
        assert!(mailer.sent().is_empty());
        notifier.notify(Notification::Unbanned {
            pseudo: "kenshin".to_string(),
            email: "kenshin@example.com".to_string(),
        });
    }

    #[test]
    fn test_ban_notice_includes_end_date() {
        let event = Notification::Banned {
            pseudo: "ryo".to_string(),
            email: "ryo@example.com".to_string(),
            ban_ends_at: chrono::DateTime::parse_from_rfc3339("2024-05-12T10:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        };
        let message = event.render();
        assert!(message.body.contains("12/05/2024"));
        assert!(message.body.contains("banni définitivement"));
    }
}
