//! Application layer: conversion orchestration services and the traits
//! they consume.

pub mod convert;
pub mod error;
pub mod formats;
pub mod repos;
