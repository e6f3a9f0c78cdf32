//! Extension chains: server-level and per-session, incoming and outgoing.
//!
//! Each fold short-circuits on the first `false`/veto. Error propagation is
//! asymmetric by design (`SPEC_FULL.md` §9, Open Question 3): a *server*
//! extension failure is a pipeline failure and propagates to the caller; a
//! *session* extension failure is logged and treated as `continue = true` so
//! one session's broken extension cannot drop another session's message.

use std::sync::Arc;

use async_trait::async_trait;
use bayeux_protocol::Message;

use crate::session::Session;

#[async_trait]
pub trait ServerExtension: Send + Sync {
    async fn incoming(&self, _session: Option<&Session>, _message: &mut Message) -> Result<bool, String> {
        Ok(true)
    }

    async fn outgoing(
        &self,
        _sender: Option<&Session>,
        _session: &Session,
        _message: &mut Message,
    ) -> Result<bool, String> {
        Ok(true)
    }
}

#[async_trait]
pub trait SessionExtension: Send + Sync {
    async fn incoming(&self, _session: &Session, _message: &mut Message) -> Result<bool, String> {
        Ok(true)
    }

    async fn outgoing(
        &self,
        _sender: Option<&Session>,
        _session: &Session,
        _message: &mut Message,
    ) -> Result<bool, String> {
        Ok(true)
    }
}

pub async fn fold_server_incoming(
    extensions: &[Arc<dyn ServerExtension>],
    session: Option<&Session>,
    message: &mut Message,
) -> Result<bool, String> {
    for ext in extensions {
        if !ext.incoming(session, message).await? {
            return Ok(false);
        }
    }
    Ok(true)
}

pub async fn fold_server_outgoing(
    extensions: &[Arc<dyn ServerExtension>],
    sender: Option<&Session>,
    session: &Session,
    message: &mut Message,
) -> Result<bool, String> {
    for ext in extensions.iter().rev() {
        if !ext.outgoing(sender, session, message).await? {
            return Ok(false);
        }
    }
    Ok(true)
}

pub async fn fold_session_incoming(
    extensions: &[Arc<dyn SessionExtension>],
    session: &Session,
    message: &mut Message,
) -> bool {
    for ext in extensions {
        match ext.incoming(session, message).await {
            Ok(true) => continue,
            Ok(false) => return false,
            Err(err) => {
                tracing::warn!(error = %err, "session incoming extension failed, continuing");
                continue;
            }
        }
    }
    true
}

pub async fn fold_session_outgoing(
    extensions: &[Arc<dyn SessionExtension>],
    sender: Option<&Session>,
    session: &Session,
    message: &mut Message,
) -> bool {
    for ext in extensions.iter().rev() {
        match ext.outgoing(sender, session, message).await {
            Ok(true) => continue,
            Ok(false) => return false,
            Err(err) => {
                tracing::warn!(error = %err, "session outgoing extension failed, continuing");
                continue;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        order: Arc<std::sync::Mutex<Vec<&'static str>>>,
        tag: &'static str,
        veto: bool,
    }

    #[async_trait]
    impl ServerExtension for Counting {
        async fn incoming(&self, _session: Option<&Session>, _message: &mut Message) -> Result<bool, String> {
            self.order.lock().unwrap().push(self.tag);
            Ok(!self.veto)
        }
    }

    #[tokio::test]
    async fn incoming_short_circuits_on_veto() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let exts: Vec<Arc<dyn ServerExtension>> = vec![
            Arc::new(Counting { order: order.clone(), tag: "a", veto: false }),
            Arc::new(Counting { order: order.clone(), tag: "b", veto: true }),
            Arc::new(Counting { order: order.clone(), tag: "c", veto: false }),
        ];
        let mut msg = Message::default();
        let result = fold_server_incoming(&exts, None, &mut msg).await.unwrap();
        assert!(!result);
        assert_eq!(*order.lock().unwrap(), vec!["a", "b"]);
    }

    struct FailingSessionExt(Arc<AtomicUsize>);

    #[async_trait]
    impl SessionExtension for FailingSessionExt {
        async fn incoming(&self, _session: &Session, _message: &mut Message) -> Result<bool, String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err("boom".to_owned())
        }
    }

    #[tokio::test]
    async fn session_incoming_failure_is_treated_as_continue() {
        let calls = Arc::new(AtomicUsize::new(0));
        let exts: Vec<Arc<dyn SessionExtension>> = vec![Arc::new(FailingSessionExt(calls.clone()))];
        let session = Session::new("s1".to_owned(), None);
        let mut msg = Message::default();
        let result = fold_session_incoming(&exts, &session, &mut msg).await;
        assert!(result, "a failing session extension must not drop the message");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
