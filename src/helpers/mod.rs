//! Low-level I/O helpers shared by the workbook readers
pub mod reader;
pub mod xml;
pub mod zip;
