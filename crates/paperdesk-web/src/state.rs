use paperdesk_core::Paperdesk;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub desk: Paperdesk,
}
