mod concurrency;
mod lifecycle;
mod processes;
