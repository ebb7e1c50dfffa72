use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogFilter {
    pub name: String,
    pub extensions: Vec<String>,
}

impl DialogFilter {
    pub fn new(name: impl Into<String>, extensions: &[&str]) -> Self {
        Self {
            name: name.into(),
            extensions: extensions.iter().map(|e| e.to_string()).collect(),
        }
    }
}

/// Native open/save dialogs. `None` means the user cancelled.
pub trait FileDialog {
    fn pick_file(&self, title: &str, directory: &Path, filters: &[DialogFilter])
        -> Option<PathBuf>;

    fn save_file(
        &self,
        title: &str,
        directory: &Path,
        file_name: &str,
        filters: &[DialogFilter],
    ) -> Option<PathBuf>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NativeDialog;

fn native(title: &str, directory: &Path, filters: &[DialogFilter]) -> rfd::FileDialog {
    filters.iter().fold(
        rfd::FileDialog::new()
            .set_title(title)
            .set_directory(directory),
        |dialog, filter| dialog.add_filter(filter.name.as_str(), &filter.extensions),
    )
}

impl FileDialog for NativeDialog {
    fn pick_file(
        &self,
        title: &str,
        directory: &Path,
        filters: &[DialogFilter],
    ) -> Option<PathBuf> {
        native(title, directory, filters).pick_file()
    }

    fn save_file(
        &self,
        title: &str,
        directory: &Path,
        file_name: &str,
        filters: &[DialogFilter],
    ) -> Option<PathBuf> {
        native(title, directory, filters)
            .set_file_name(file_name)
            .save_file()
    }
}
