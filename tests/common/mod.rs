#![allow(dead_code)]

pub(crate) mod chain;

pub(crate) mod logging;

pub(crate) mod mem_db;

pub(crate) mod producer;
