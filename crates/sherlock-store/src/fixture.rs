//! A small Chinook-shaped database for tests.

use crate::database::Database;
use crate::error::StoreError;

const DEMO_SCHEMA: &str = "
CREATE TABLE employees (
    EmployeeId INTEGER NOT NULL PRIMARY KEY,
    LastName NVARCHAR(20) NOT NULL,
    FirstName NVARCHAR(20) NOT NULL,
    Title NVARCHAR(30),
    ReportsTo INTEGER,
    HireDate DATETIME
);
CREATE TABLE invoices (
    InvoiceId INTEGER NOT NULL PRIMARY KEY,
    CustomerId INTEGER NOT NULL,
    InvoiceDate DATETIME NOT NULL,
    BillingCountry NVARCHAR(40),
    Total NUMERIC(10,2) NOT NULL
);

INSERT INTO employees VALUES
    (1, 'Adams', 'Andrew', 'General Manager', NULL, '2002-08-14'),
    (2, 'Edwards', 'Nancy', 'Sales Manager', 1, '2002-05-01'),
    (3, 'Peacock', 'Jane', 'Sales Support Agent', 2, '2002-04-01'),
    (4, 'Park', 'Margaret', 'Sales Support Agent', 2, '2003-05-03'),
    (5, 'Johnson', 'Steve', 'Sales Support Agent', 2, '2003-10-17'),
    (6, 'Mitchell', 'Michael', 'IT Manager', 1, '2003-10-17'),
    (7, 'King', 'Robert', 'IT Staff', 6, '2004-01-02'),
    (8, 'Callahan', 'Laura', 'IT Staff', 6, '2004-03-04');

INSERT INTO invoices VALUES
    (1, 2, '2021-01-01', 'Germany', 1.98),
    (2, 4, '2021-01-02', 'Norway', 3.96),
    (3, 8, '2021-01-03', 'Belgium', 5.94),
    (4, 14, '2021-01-06', 'Canada', 8.91),
    (5, 23, '2021-01-11', 'USA', 13.86),
    (6, 37, '2021-01-19', 'Germany', 0.99),
    (7, 38, '2021-02-01', 'Germany', 1.98),
    (8, 40, '2021-02-01', 'France', 1.98),
    (9, 42, '2021-02-02', 'France', 3.96),
    (10, 46, '2021-02-03', 'Ireland', 5.94),
    (11, 52, '2021-02-06', 'United Kingdom', 8.91),
    (12, 2, '2021-02-11', 'Germany', 13.86),
    (13, 16, '2021-02-19', 'USA', 0.99),
    (14, 17, '2021-03-04', 'USA', 1.98),
    (15, 19, '2021-03-04', 'USA', 1.98),
    (16, 21, '2021-03-05', 'USA', 3.96),
    (17, 25, '2021-03-06', 'USA', 5.94),
    (18, 31, '2021-03-09', 'Canada', 8.91),
    (19, 40, '2021-03-14', 'France', 13.86),
    (20, 54, '2021-03-22', 'United Kingdom', 0.99);
";

pub const DEMO_DESCRIPTIONS: &str = "\
tables:
  - name: employees
    description: Company staff, one row per employee.
    columns:
      - name: ReportsTo
        description: EmployeeId of the direct manager.
  - name: invoices
    description: One row per customer purchase.
    columns:
      - name: BillingCountry
        description: Country the invoice was billed to.
      - name: Total
        description: Invoice total in USD.
";

/// Fresh in-memory database seeded with employees and invoices.
pub fn demo_database() -> Result<Database, StoreError> {
    let db = Database::in_memory()?;
    db.with_conn(|conn| {
        conn.execute_batch(DEMO_SCHEMA)?;
        Ok(())
    })?;
    Ok(db)
}
