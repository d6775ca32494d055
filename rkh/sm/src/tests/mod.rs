mod completion;
mod dispatch;
