// UI layer: terminal implementation of the workflow's `Ui` trait using
// `dialoguer` prompts, an `rfd` folder dialog and an `indicatif` progress
// bar, plus the main menu that plays the role of the launcher button.

use crate::cancel::{CancelToken, KeyWatcher};
use crate::config::FolderPicker;
use crate::error::DeployError;
use crate::launcher::Launcher;
use crate::workflow::{InputRequest, Outcome, Ui};
use anyhow::Result;
use dialoguer::{Confirm, Input, Password, Select};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

fn prompt_error(err: std::io::Error) -> DeployError {
    DeployError::Prompt(err.to_string())
}

/// Terminal front-end for the deploy workflow.
pub struct TerminalUi {
    picker: FolderPicker,
    bar: Option<ProgressBar>,
    watcher: Option<KeyWatcher>,
}

impl TerminalUi {
    pub fn new(picker: FolderPicker) -> Self {
        Self {
            picker,
            bar: None,
            watcher: None,
        }
    }

    fn bar(&mut self) -> &ProgressBar {
        self.bar.get_or_insert_with(|| {
            let bar = ProgressBar::new(100);
            if let Ok(style) =
                ProgressStyle::with_template("{spinner} [{bar:40}] {pos:>3}% {msg}  (Esc to cancel)")
            {
                bar.set_style(style);
            }
            bar
        })
    }

    /// Remove the bar before printing anything else.
    fn clear_bar(&mut self) {
        self.watcher = None;
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

impl Ui for TerminalUi {
    fn input(&mut self, request: InputRequest<'_>) -> Result<Option<String>, DeployError> {
        self.clear_bar();
        // `Password` hides the token while it is typed.
        let answer = if request.secret {
            Password::new()
                .with_prompt(request.title)
                .allow_empty_password(true)
                .interact()
                .map_err(prompt_error)?
        } else {
            let mut input = Input::<String>::new();
            input.with_prompt(request.title).allow_empty(true);
            if let Some(value) = request.value {
                input.with_initial_text(value);
            }
            input.interact_text().map_err(prompt_error)?
        };
        let answer = answer.trim().to_string();
        Ok((!answer.is_empty()).then_some(answer))
    }

    fn pick_folders(&mut self) -> Result<Vec<PathBuf>, DeployError> {
        self.clear_bar();
        match self.picker {
            FolderPicker::Dialog => Ok(rfd::FileDialog::new()
                .set_title("Select the folder to deploy")
                .pick_folder()
                .into_iter()
                .collect()),
            FolderPicker::Prompt => {
                let path: String = Input::new()
                    .with_prompt("Folder to deploy")
                    .allow_empty(true)
                    .interact_text()
                    .map_err(prompt_error)?;
                let path = path.trim();
                Ok(if path.is_empty() {
                    Vec::new()
                } else {
                    vec![PathBuf::from(path)]
                })
            }
        }
    }

    fn show_info(&mut self, message: &str) {
        self.clear_bar();
        println!("{message}");
    }

    fn show_error(&mut self, message: &str, action: Option<&str>) -> Result<bool, DeployError> {
        self.clear_bar();
        eprintln!("Error: {message}");
        match action {
            Some(action) => Confirm::new()
                .with_prompt(format!("{action}?"))
                .default(false)
                .interact()
                .map_err(prompt_error),
            None => Ok(false),
        }
    }

    fn show_success(&mut self, message: &str, link: &str) {
        self.clear_bar();
        println!("{message}: {link}");
    }

    fn report_progress(&mut self, percent: u8, message: &str) {
        let bar = self.bar();
        bar.set_position(u64::from(percent.min(100)));
        bar.set_message(message.to_string());
    }

    fn begin_task(&mut self, cancel: &CancelToken) {
        if self.watcher.is_none() {
            self.watcher = Some(KeyWatcher::spawn(cancel.clone()));
        }
    }

    fn end_task(&mut self) {
        self.watcher = None;
    }
}

/// Main interactive menu. Runs a select loop until the user chooses "Exit".
///
/// Note: `Select::interact()` is keyboard-driven: you can use arrow keys
/// and Enter to choose an option.
pub fn main_menu(mut launcher: Launcher) -> Result<()> {
    let mut ui = TerminalUi::new(launcher.config().folder_picker);
    loop {
        let items = vec!["Deploy with Hostme", "Clear saved token", "Exit"];
        let selection = Select::new().items(&items).default(0).interact()?;
        match selection {
            0 => match launcher.deploy(&mut ui) {
                Outcome::Cancelled => println!("Deploy cancelled."),
                Outcome::Deployed { .. } | Outcome::NothingSelected | Outcome::Failed(_) => {}
            },
            1 => {
                if launcher.has_token() {
                    launcher.clear_token()?;
                    println!("Saved bearer token removed.");
                } else {
                    println!("No bearer token saved.");
                }
            }
            2 => break,
            _ => {}
        }
    }
    launcher.dispose();
    Ok(())
}
