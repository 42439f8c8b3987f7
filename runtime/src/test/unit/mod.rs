mod manager;
mod ops;
mod sequence;
