//! Behavioural tests for requirement document parsing.
