use crate::NoteId;

/// Screens the application can show
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    Welcome,
    Login,
    SignUp,
    Home,
    EditNote(NoteId),
    Search,
    Settings,
}

/// First screen after launch: sign-in when any account exists, otherwise the
/// welcome screen.
pub fn launch_screen(has_accounts: bool) -> Screen {
    if has_accounts {
        Screen::Login
    } else {
        Screen::Welcome
    }
}

/// Back stack of screens. Never empty.
#[derive(Debug, Clone)]
pub struct NavigationStack {
    stack: Vec<Screen>,
}

impl Default for NavigationStack {
    fn default() -> Self {
        Self::new(Screen::Welcome)
    }
}

impl NavigationStack {
    pub fn new(root: Screen) -> Self {
        Self { stack: vec![root] }
    }

    pub fn navigate_to(&mut self, screen: Screen) {
        self.stack.push(screen);
    }

    /// Pops the top screen unless it is the only one. Returns whether it popped.
    pub fn navigate_back(&mut self) -> bool {
        if self.stack.len() > 1 {
            self.stack.pop();
            true
        } else {
            false
        }
    }

    pub fn reset_to(&mut self, screen: Screen) {
        self.stack = vec![screen];
    }

    pub fn current(&self) -> &Screen {
        // the stack always holds at least the root
        &self.stack[self.stack.len() - 1]
    }

    pub fn screens(&self) -> &[Screen] {
        &self.stack
    }

    pub fn can_go_back(&self) -> bool {
        self.stack.len() > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_back_never_empties_stack() {
        let mut nav = NavigationStack::default();
        assert_eq!(nav.current(), &Screen::Welcome);
        assert!(!nav.navigate_back());

        nav.navigate_to(Screen::SignUp);
        nav.navigate_to(Screen::Home);
        assert_eq!(nav.screens().len(), 3);
        assert!(nav.navigate_back());
        assert_eq!(nav.current(), &Screen::SignUp);
    }

    #[test]
    fn test_reset_replaces_stack() {
        let mut nav = NavigationStack::new(launch_screen(true));
        assert_eq!(nav.current(), &Screen::Login);
        nav.navigate_to(Screen::EditNote(4));
        nav.reset_to(Screen::Home);
        assert_eq!(nav.screens(), &[Screen::Home]);
        assert!(!nav.can_go_back());
        assert_eq!(launch_screen(false), Screen::Welcome);
    }
}
