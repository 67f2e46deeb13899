use bytes::Bytes;
use pixwire_frame::Frame;

/// A handler refused a request.
///
/// The connection that carried the request is closed without a response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("handler failed: {message}")]
pub struct HandlerError {
    pub message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub type HandlerResult = std::result::Result<Bytes, HandlerError>;

/// Turns one decoded request frame into the response payload.
///
/// The response always goes out as `binary/image` with the request's
/// `content-encoding`. Implementations are shared by every worker thread.
pub trait PayloadHandler: Send + Sync + 'static {
    fn handle(&self, request: &Frame) -> HandlerResult;
}

impl<F> PayloadHandler for F
where
    F: Fn(&Frame) -> HandlerResult + Send + Sync + 'static,
{
    fn handle(&self, request: &Frame) -> HandlerResult {
        self(request)
    }
}

/// Responds with the request payload unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoHandler;

impl PayloadHandler for EchoHandler {
    fn handle(&self, request: &Frame) -> HandlerResult {
        Ok(request.payload.clone())
    }
}

/// Responds with an empty payload, acknowledging receipt only.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyHandler;

impl PayloadHandler for EmptyHandler {
    fn handle(&self, _request: &Frame) -> HandlerResult {
        Ok(Bytes::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_returns_request_payload() {
        let frame = Frame::image(b"jpeg bytes".to_vec());
        assert_eq!(EchoHandler.handle(&frame).unwrap().as_ref(), b"jpeg bytes");
    }

    #[test]
    fn empty_ignores_payload() {
        let frame = Frame::image(b"jpeg bytes".to_vec());
        assert!(EmptyHandler.handle(&frame).unwrap().is_empty());
    }

    #[test]
    fn closures_are_handlers() {
        let handler = |frame: &Frame| -> HandlerResult {
            if frame.payload.is_empty() {
                Err(HandlerError::new("empty image"))
            } else {
                Ok(Bytes::from_static(b"ok"))
            }
        };

        assert_eq!(
            handler.handle(&Frame::image(Bytes::new())).unwrap_err(),
            HandlerError::new("empty image")
        );
        assert_eq!(handler.handle(&Frame::image(b"x".to_vec())).unwrap().as_ref(), b"ok");
    }
}
