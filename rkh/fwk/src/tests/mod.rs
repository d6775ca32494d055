mod framework;
mod recorder;
