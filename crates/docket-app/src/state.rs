// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::TabKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    pub active_tab: TabKind,
    pub focused_bucket: usize,
    pub show_help: bool,
    pub status_line: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            active_tab: TabKind::Invoices,
            focused_bucket: 0,
            show_help: false,
            status_line: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCommand {
    NextTab,
    PrevTab,
    FocusNextBucket { buckets: usize },
    FocusPrevBucket { buckets: usize },
    ToggleHelp,
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    TabChanged(TabKind),
    FocusChanged(usize),
    HelpVisibilityChanged(bool),
    StatusUpdated(String),
    StatusCleared,
}

impl AppState {
    pub fn dispatch(&mut self, command: AppCommand) -> Vec<AppEvent> {
        match command {
            AppCommand::NextTab => self.rotate_tab(1),
            AppCommand::PrevTab => self.rotate_tab(-1),
            AppCommand::FocusNextBucket { buckets } => self.rotate_focus(1, buckets),
            AppCommand::FocusPrevBucket { buckets } => self.rotate_focus(-1, buckets),
            AppCommand::ToggleHelp => {
                self.show_help = !self.show_help;
                vec![AppEvent::HelpVisibilityChanged(self.show_help)]
            }
            AppCommand::ClearStatus => {
                self.status_line = None;
                vec![AppEvent::StatusCleared]
            }
        }
    }

    /// Re-home the focus after the bucket sequence changes shape.
    pub fn sync_focus(&mut self, buckets: usize) {
        if buckets == 0 {
            self.focused_bucket = 0;
        } else if self.focused_bucket >= buckets {
            self.focused_bucket = buckets - 1;
        }
    }

    pub fn set_status(&mut self, message: &str) -> AppEvent {
        self.status_line = Some(message.to_owned());
        AppEvent::StatusUpdated(message.to_owned())
    }

    fn rotate_tab(&mut self, delta: isize) -> Vec<AppEvent> {
        let tabs = TabKind::ALL;
        let current = tabs
            .iter()
            .position(|tab| *tab == self.active_tab)
            .unwrap_or(0) as isize;
        let len = tabs.len() as isize;
        let next = (current + delta).rem_euclid(len) as usize;
        self.active_tab = tabs[next];
        // Tab switches reset focus to the top of the list.
        self.focused_bucket = 0;
        vec![AppEvent::TabChanged(self.active_tab)]
    }

    fn rotate_focus(&mut self, delta: isize, buckets: usize) -> Vec<AppEvent> {
        if buckets == 0 {
            return Vec::new();
        }
        let len = buckets as isize;
        let current = (self.focused_bucket as isize).min(len - 1);
        let next = (current + delta).rem_euclid(len) as usize;
        if next == self.focused_bucket {
            return Vec::new();
        }
        self.focused_bucket = next;
        vec![AppEvent::FocusChanged(next)]
    }
}
