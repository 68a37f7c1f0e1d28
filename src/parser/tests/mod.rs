mod expressions;
mod select;
