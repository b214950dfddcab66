//! Error Dispatch Module
//!
//! Classifies failed calls, tells the user about them and reacts to expired
//! credentials. Every failure comes back out as an [`ApiError`] for the caller
//! to raise.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::auth::SessionStore;
use crate::envelope::FailureDetails;
use crate::error::{ApiError, FALLBACK_MESSAGE, SESSION_EXPIRED_MESSAGE};
use crate::notify::{Navigator, Notification, Notifier};
use crate::transport::{RawResponse, TransportError};

/// A call that did not produce usable data
#[derive(Debug)]
pub enum Failure {
    /// Nothing came back (unreachable, timed out)
    NoResponse(TransportError),
    /// The backend answered with status >= 400
    Status(RawResponse),
    /// The response was fine at the HTTP level but carried an error
    Rejected(ApiError),
}

pub struct ErrorDispatcher {
    session: Arc<SessionStore>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
    login_path: String,
}

impl ErrorDispatcher {
    pub fn new(
        session: Arc<SessionStore>,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
        login_path: impl Into<String>,
    ) -> Self {
        Self {
            session,
            notifier,
            navigator,
            login_path: login_path.into(),
        }
    }

    /// Run the side effects for `failure` and return the error to raise.
    /// `credential` is the access token the failed call was sent with.
    pub fn dispatch(&self, failure: Failure, credential: Option<&str>) -> ApiError {
        let err = classify(failure);

        if err.is_auth_expired() {
            self.expire_session(credential);
        } else {
            warn!(kind = %err.kind, trace_id = ?err.trace_id, "Request failed: {}", err.message);
            self.notifier.notify(Notification::error(err.message.clone()));
        }

        err
    }

    fn expire_session(&self, credential: Option<&str>) {
        if !self.session.mark_expired(credential) {
            debug!("Session expiry already handled");
            return;
        }

        warn!("Credentials rejected, ending session");
        self.notifier.notify(Notification::error(SESSION_EXPIRED_MESSAGE));

        if let Err(e) = self.session.clear_session() {
            error!("Failed to clear expired session: {}", e);
        }

        self.navigator.hard_redirect(&self.login_path);
    }
}

/// Map a failure onto the error taxonomy
pub fn classify(failure: Failure) -> ApiError {
    match failure {
        Failure::NoResponse(e) => {
            let message = e.to_string();
            if message.is_empty() {
                ApiError::network(FALLBACK_MESSAGE)
            } else {
                ApiError::network(message)
            }
        }
        Failure::Status(response) => {
            let status = response.status;
            let details = FailureDetails::from_body(&response.body);
            let recognized = details.is_recognized();
            let message = details
                .message
                .unwrap_or_else(|| format!("Request failed with status code {}", status));

            let err = if status == 401 {
                ApiError::auth_expired(message)
            } else if recognized {
                ApiError::application(details.code, message)
            } else {
                ApiError::http(status, message)
            };
            err.with_trace_id(details.trace_id)
        }
        Failure::Rejected(err) => err,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::notify::{NotificationCenter, RedirectRecorder};
    use crate::storage::MemoryStorage;
    use serde_json::{json, Value};

    struct Fixture {
        session: Arc<SessionStore>,
        notes: Arc<NotificationCenter>,
        redirects: Arc<RedirectRecorder>,
        dispatcher: ErrorDispatcher,
    }

    fn fixture() -> Fixture {
        let session = Arc::new(SessionStore::new(Arc::new(MemoryStorage::new())));
        let notes = Arc::new(NotificationCenter::new());
        let redirects = Arc::new(RedirectRecorder::new());
        let dispatcher = ErrorDispatcher::new(
            session.clone(),
            notes.clone(),
            redirects.clone(),
            "/login",
        );
        Fixture {
            session,
            notes,
            redirects,
            dispatcher,
        }
    }

    fn unauthorized() -> Failure {
        Failure::Status(RawResponse::json(401, Value::Null))
    }

    fn messages(notes: &NotificationCenter) -> Vec<String> {
        notes.drain().into_iter().map(|n| n.message).collect()
    }

    #[test]
    fn server_message_wins() {
        let f = fixture();
        let err = f.dispatcher.dispatch(
            Failure::Status(RawResponse::json(
                409,
                json!({"ok": false, "error": {"code": "CONFLICT", "message": "email taken"}}),
            )),
            None,
        );

        assert_eq!(
            err.kind,
            ErrorKind::Application {
                code: Some("CONFLICT".into())
            }
        );
        assert_eq!(messages(&f.notes), vec!["email taken"]);
        assert!(f.redirects.redirects().is_empty());
    }

    #[test]
    fn unrecognized_body_falls_back_to_transport_text() {
        let f = fixture();
        let err = f
            .dispatcher
            .dispatch(Failure::Status(RawResponse::json(502, json!("Bad Gateway"))), None);

        assert_eq!(err.kind, ErrorKind::Http(502));
        assert_eq!(err.message, "Request failed with status code 502");
        assert_eq!(messages(&f.notes), vec![err.message]);
    }

    #[test]
    fn no_response_is_network() {
        let f = fixture();
        let err = f.dispatcher.dispatch(
            Failure::NoResponse(TransportError::Timeout("deadline elapsed".into())),
            Some("a"),
        );

        assert_eq!(err.kind, ErrorKind::Network);
        assert_eq!(f.notes.len(), 1);
    }

    #[test]
    fn rejected_error_is_notified_and_returned() {
        let f = fixture();
        let err = f
            .dispatcher
            .dispatch(Failure::Rejected(ApiError::application(None, "m")), None);

        assert_eq!(err.message, "m");
        assert_eq!(messages(&f.notes), vec!["m"]);
    }

    #[test]
    fn unauthorized_clears_session_and_redirects() {
        let f = fixture();
        f.session.set_session("a", "b").unwrap();

        let err = f.dispatcher.dispatch(unauthorized(), Some("a"));

        assert!(err.is_auth_expired());
        assert!(!f.session.is_authenticated());
        assert_eq!(f.session.refresh_token(), None);
        assert_eq!(messages(&f.notes), vec![SESSION_EXPIRED_MESSAGE]);
        assert_eq!(f.redirects.redirects(), vec!["/login"]);
    }

    #[test]
    fn concurrent_unauthorized_fires_side_effects_once() {
        let f = fixture();
        f.session.set_session("a", "b").unwrap();

        let errors: Vec<ApiError> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..5)
                .map(|_| {
                    scope.spawn(|| f.dispatcher.dispatch(unauthorized(), Some("a")))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(errors.iter().all(ApiError::is_auth_expired));
        assert_eq!(f.notes.len(), 1);
        assert_eq!(f.redirects.redirects().len(), 1);
        assert!(!f.session.is_authenticated());
    }

    #[test]
    fn sequential_unauthorized_calls_each_notify() {
        let f = fixture();

        // Rejected login attempts carry no token.
        f.dispatcher.dispatch(unauthorized(), None);
        f.dispatcher.dispatch(unauthorized(), None);

        assert_eq!(
            messages(&f.notes),
            vec![SESSION_EXPIRED_MESSAGE, SESSION_EXPIRED_MESSAGE]
        );
        assert_eq!(f.redirects.redirects().len(), 2);
    }

    #[test]
    fn late_rejection_of_an_expired_token_is_silent() {
        let f = fixture();
        f.session.set_session("a", "b").unwrap();

        f.dispatcher.dispatch(unauthorized(), Some("a"));
        let late = f.dispatcher.dispatch(unauthorized(), Some("a"));

        assert!(late.is_auth_expired());
        assert_eq!(f.notes.len(), 1);
        assert_eq!(f.redirects.redirects().len(), 1);
    }

    #[test]
    fn login_rearms_expiry_handling() {
        let f = fixture();
        f.session.set_session("a", "b").unwrap();
        f.dispatcher.dispatch(unauthorized(), Some("a"));

        f.session.set_session("a2", "b2").unwrap();
        f.dispatcher.dispatch(unauthorized(), Some("a2"));

        assert_eq!(f.redirects.redirects().len(), 2);
        assert!(!f.session.is_authenticated());
    }
}
