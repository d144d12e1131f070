mod groups;
mod selection;
mod settings;
