//! Fixed schema and workload applied to the source database.
//!
//! The replication tasks select tables by rule: `a%` (authors, accounts)
//! for the first task of each pair, `novels` for the second.

pub const TABLES: [&str; 3] = ["authors", "accounts", "novels"];

/// Tables matched by the first task of each pair.
pub const FIRST_TASK_TABLES: [&str; 2] = ["authors", "accounts"];

/// Tables matched by the second task of each pair.
pub const SECOND_TASK_TABLES: [&str; 1] = ["novels"];

// Dependants first: novels references authors.
pub const DROP_TABLES: [&str; 3] = [
    "DROP TABLE IF EXISTS novels;",
    "DROP TABLE IF EXISTS accounts;",
    "DROP TABLE IF EXISTS authors;",
];

pub const CREATE_AUTHORS: &str = "CREATE TABLE authors (
    author_id INT AUTO_INCREMENT PRIMARY KEY,
    first_name VARCHAR(100) NOT NULL,
    last_name VARCHAR(100) NOT NULL,
    date_of_birth DATE,
    nationality VARCHAR(50),
    biography TEXT,
    email VARCHAR(255),
    phone_number VARCHAR(20),
    active BOOLEAN DEFAULT TRUE,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);";

pub const CREATE_ACCOUNTS: &str = "CREATE TABLE accounts (
    id INT AUTO_INCREMENT PRIMARY KEY,
    name VARCHAR(255) NOT NULL,
    age TINYINT UNSIGNED,
    birth_date DATE,
    account_balance DECIMAL(10, 2),
    is_active BOOLEAN,
    signup_time TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    last_login DATETIME,
    bio TEXT,
    profile_picture BLOB,
    favorite_color ENUM('red', 'green', 'blue'),
    height FLOAT,
    weight DOUBLE
);";

pub const CREATE_NOVELS: &str = "CREATE TABLE novels (
    novel_id INT AUTO_INCREMENT PRIMARY KEY,
    title VARCHAR(255) NOT NULL,
    author_id INT,
    publish_date DATE,
    isbn VARCHAR(20),
    genre VARCHAR(100),
    page_count INT,
    publisher VARCHAR(100),
    language VARCHAR(50),
    available_copies INT,
    total_copies INT,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (author_id) REFERENCES authors(author_id)
);";

pub const CREATE_TABLES: [&str; 3] = [CREATE_AUTHORS, CREATE_ACCOUNTS, CREATE_NOVELS];

pub const INSERT_AUTHORS: &str = "INSERT INTO authors (first_name, last_name, date_of_birth, nationality, biography, email, phone_number)
VALUES
('John', 'Doe', '1980-01-01', 'American', 'Biography of John Doe.', 'john.doe@example.com', '123-456-7890');";

pub const INSERT_ACCOUNTS: &str = "INSERT INTO accounts
(name, age, birth_date, account_balance, is_active, signup_time, last_login, bio, profile_picture, favorite_color, height, weight)
VALUES
('Alice', 30, '1991-05-21', 1500.00, TRUE, '2021-01-08 09:00:00', '2021-03-10 08:00:00', 'Bio of Alice', NULL, 'red', 1.70, 60.5);";

pub const INSERT_NOVELS: &str = "INSERT INTO novels (title, author_id, publish_date, isbn, genre, page_count, publisher, language, available_copies, total_copies)
VALUES
('The Great Adventure', 1, '2020-06-01', '978-3-16-148410-0', 'Adventure', 300, 'Adventure Press', 'English', 10, 20),
('Journey to the Stars', 1, '2021-04-10', '978-0-11-322456-7', 'Science Fiction', 350, 'SciFi Universe', 'English', 12, 25);";

pub const PRESEED_DATA: [&str; 3] = [INSERT_AUTHORS, INSERT_ACCOUNTS, INSERT_NOVELS];

/// Row counts after [`PRESEED_DATA`], in [`TABLES`] order.
pub const PRESEED_COUNTS: [(&str, i64); 3] = [("authors", 1), ("accounts", 1), ("novels", 2)];

/// One alteration per table: a type change, a dropped column and an added
/// column with a default.
pub const ALTER_TABLES: [&str; 3] = [
    "ALTER TABLE authors MODIFY COLUMN email VARCHAR(100)",
    "ALTER TABLE accounts DROP COLUMN profile_picture;",
    "ALTER TABLE novels ADD COLUMN is_stock BOOLEAN DEFAULT TRUE;",
];

// ---------------------------------------------------------------------------
// Expected stream volumes
// ---------------------------------------------------------------------------

/// Full load of the `a%` task: 2 drops, 2 creates, 1 author, 1 account.
pub const FULL_LOAD_FIRST_EVENTS: usize = 6;

/// Full load of the `novels` task: 1 drop, 1 create, 2 novels.
pub const FULL_LOAD_SECOND_EVENTS: usize = 4;

/// Change capture start: the exceptions table twice, plus 3 table creates.
pub const CDC_CREATE_EVENTS: usize = 5;

/// One record per inserted row.
pub const CDC_INSERT_EVENTS: usize = 4;

/// One record per altered table.
pub const CDC_ALTER_EVENTS: usize = 3;
