//! Headless client core for the ConversationalTax mobile app.
//!
//! Holds everything the app does besides drawing: the push-to-talk capture
//! state machine, the REST connection to the server, route-stack navigation
//! with the drawer menu, and the screen models a UI toolkit renders.

pub mod capture;
pub mod error;
pub mod navigation;
pub mod rest;
pub mod screens;
pub mod state;

pub use capture::{AudioUploader, CaptureController, RecordedAudio, Recorder, Recording};
pub use error::ClientError;
pub use navigation::{DrawerItem, DrawerMenu, NavigationContext, Route};
pub use rest::RestConnection;
pub use screens::{
    HistoryScreen, HistorySource, NotificationSource, NotificationsScreen, StartScreen,
};
pub use state::{CaptureState, StateMachine};
