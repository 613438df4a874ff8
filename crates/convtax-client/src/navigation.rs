//! Route-stack navigation and the side drawer.

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;
use tracing::debug;

/// Screens of the app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Start,
    Conversation,
    Notifications,
    Scanner,
    ConversationHistory,
    Debug,
    Credits,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Start => "Start",
            Route::Conversation => "Conversation",
            Route::Notifications => "Notifications",
            Route::Scanner => "Scanner",
            Route::ConversationHistory => "ConversationHistory",
            Route::Debug => "Debug",
            Route::Credits => "Credits",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
struct StackEntry {
    route: Route,
    params: HashMap<String, Value>,
}

/// Navigation state passed explicitly to every screen.
#[derive(Debug, Clone, Default)]
pub struct NavigationContext {
    stack: Vec<StackEntry>,
    drawer_open: bool,
}

impl NavigationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push `route` with optional parameters. Closes the drawer.
    pub fn navigate(&mut self, route: Route, params: HashMap<String, Value>) {
        debug!(route = %route, depth = self.stack.len() + 1, "Navigate");
        self.stack.push(StackEntry { route, params });
        self.drawer_open = false;
    }

    /// Leave the current route and navigate to the previous one again.
    /// Returns the route now active, if any.
    pub fn go_back(&mut self) -> Option<Route> {
        self.stack.pop();
        let previous = self.stack.pop()?;
        self.navigate(previous.route, previous.params);
        Some(previous.route)
    }

    /// The route on top of the stack.
    pub fn active_route(&self) -> Option<Route> {
        self.stack.last().map(|e| e.route)
    }

    /// Name of the active route, empty when nothing was navigated to yet.
    pub fn active_route_name(&self) -> &'static str {
        self.active_route().map(|r| r.as_str()).unwrap_or("")
    }

    /// Parameter of the active route.
    pub fn param(&self, key: &str) -> Option<&Value> {
        self.stack.last().and_then(|e| e.params.get(key))
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn open_drawer(&mut self) {
        self.drawer_open = true;
    }

    pub fn close_drawer(&mut self) {
        self.drawer_open = false;
    }

    pub fn is_drawer_open(&self) -> bool {
        self.drawer_open
    }
}

/// One entry of the drawer menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawerItem {
    pub label: &'static str,
    pub route: Route,
    /// Whether `route` is the active route.
    pub active: bool,
}

/// Drawer content: main items on top, tools and credits at the bottom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawerMenu {
    pub main: Vec<DrawerItem>,
    pub bottom: Vec<DrawerItem>,
}

const MAIN_ITEMS: [(&str, Route); 4] = [
    ("Start", Route::Conversation),
    ("Benachrichtigungen", Route::Notifications),
    ("Scanner", Route::Scanner),
    ("Verlauf", Route::ConversationHistory),
];

const BOTTOM_ITEMS: [(&str, Route); 2] = [
    ("Entwickler-Werkzeuge", Route::Debug),
    ("Credits", Route::Credits),
];

impl DrawerMenu {
    /// Build the menu, marking the item of the active route.
    pub fn for_context(nav: &NavigationContext) -> Self {
        let active = nav.active_route();
        let items = |entries: &[(&'static str, Route)]| -> Vec<DrawerItem> {
            entries
                .iter()
                .map(|&(label, route)| DrawerItem {
                    label,
                    route,
                    active: active == Some(route),
                })
                .collect()
        };
        Self {
            main: items(&MAIN_ITEMS),
            bottom: items(&BOTTOM_ITEMS),
        }
    }

    /// Navigate to the item with `label`. Returns false for unknown labels.
    pub fn select(nav: &mut NavigationContext, label: &str) -> bool {
        let target = MAIN_ITEMS
            .iter()
            .chain(BOTTOM_ITEMS.iter())
            .find(|(l, _)| *l == label)
            .map(|&(_, route)| route);
        match target {
            Some(route) => {
                nav.navigate(route, HashMap::new());
                true
            }
            None => false,
        }
    }
}
