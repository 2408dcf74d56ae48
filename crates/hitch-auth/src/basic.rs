use hitch_http::{Credentials, Event, Request, Result, Subscriber};

/// Puts username and password on every request for the transport to send
/// as HTTP Basic authentication.
#[derive(Clone)]
pub struct BasicAuth {
    credentials: Credentials,
}

impl BasicAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            credentials: Credentials::basic(username, password),
        }
    }
}

impl Subscriber for BasicAuth {
    fn name(&self) -> &'static str { "basic_auth" }

    fn subscribed_events(&self) -> Vec<(Event, i32)> { vec![(Event::CreateRequest, 0)] }

    fn on_create(&self, request: &mut Request) -> Result<()> {
        request.set_credentials(self.credentials.clone());
        Ok(())
    }
}
