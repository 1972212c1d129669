//! End-to-end runs against CSV fixtures and the in-memory warehouse.

use bigdecimal::BigDecimal;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tempfile::TempDir;

use salesload::warehouse::Operation;
use salesload::{
    Config, Customer, EtlError, MemoryWarehouse, Order, OrderLine, Phase, Pipeline, Product,
    Table, TransactionScope, Warehouse,
};

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let fixture = Self {
            dir: TempDir::new().unwrap(),
        };
        fixture.write(
            "customers.csv",
            "CustomerID,Name,Email,Phone\n\
             1,Ana Lima,ana@example.com,555-0101\n\
             2,Bo Chen,,555-0102\n\
             2,Bo Chen,,555-0102\n\
             3,Cy Roe,cy@example.com,\n",
        );
        fixture.write(
            "products.csv",
            "ProductID,ProductName,Category,Price\n\
             5,Widget,Hardware,9.99\n\
             6,Gadget,,24.50\n\
             7,Doohickey,Hardware,1.25\n",
        );
        fixture.write(
            "orders.csv",
            "OrderID,CustomerID,OrderDate\n\
             100,1,2024-01-05 09:30:00\n\
             101,2,not-a-date\n\
             102,3,2024-02-11\n",
        );
        fixture.write(
            "order_details.csv",
            "OrderID,ProductID,Quantity,TotalPrice\n\
             100,5,2,19.98\n\
             100,5,3,29.97\n\
             100,6,1,24.50\n\
             101,7,4,5.00\n\
             102,5,1,9.99\n",
        );
        fixture
    }

    fn write(&self, name: &str, content: &str) {
        fs::write(self.dir.path().join(name), content).unwrap();
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn config(&self) -> Config {
        let mut config = Config::default();
        config.source.data_dir = self.path().to_path_buf();
        config
    }
}

fn dec(s: &str) -> BigDecimal {
    BigDecimal::from_str(s).unwrap()
}

#[test]
fn test_full_run_loads_clean_snapshot() {
    let fixture = Fixture::new();
    let mut store = MemoryWarehouse::new();

    let report = Pipeline::new(fixture.config())
        .unwrap()
        .run(&mut store)
        .unwrap();

    assert!(report.validation.all_match());
    assert_eq!(store.count(Table::Customers).unwrap(), 3);
    assert_eq!(store.count(Table::Products).unwrap(), 3);
    assert_eq!(store.count(Table::Orders).unwrap(), 3);
    assert_eq!(store.count(Table::OrderDetails).unwrap(), 4);

    assert_eq!(report.summary.duplicate_line_rows, 2);
    assert_eq!(report.summary.merged_line_keys, 1);
    assert_eq!(report.summary.invalid_dates, 1);
}

#[test]
fn test_defaults_applied_to_missing_columns() {
    let fixture = Fixture::new();
    let mut store = MemoryWarehouse::new();
    Pipeline::new(fixture.config())
        .unwrap()
        .run(&mut store)
        .unwrap();

    let customers: Vec<Customer> = store.rows(Table::Customers).unwrap();
    let bo = customers.iter().find(|c| c.customer_id == 2).unwrap();
    assert_eq!(bo.email, "");

    let products: Vec<Product> = store.rows(Table::Products).unwrap();
    let gadget = products.iter().find(|p| p.product_id == 6).unwrap();
    assert_eq!(gadget.category, "Unknown");

    let orders: Vec<Order> = store.rows(Table::Orders).unwrap();
    let bad_date = orders.iter().find(|o| o.order_id == 101).unwrap();
    assert_eq!(bad_date.order_date, None);
    assert!(orders.iter().find(|o| o.order_id == 102).unwrap().order_date.is_some());
}

#[test]
fn test_duplicate_order_lines_are_summed() {
    let fixture = Fixture::new();
    let mut store = MemoryWarehouse::new();
    Pipeline::new(fixture.config())
        .unwrap()
        .run(&mut store)
        .unwrap();

    let lines: Vec<OrderLine> = store.rows(Table::OrderDetails).unwrap();
    let merged = lines
        .iter()
        .find(|l| l.order_id == 100 && l.product_id == 5)
        .unwrap();
    assert_eq!(merged.quantity, 5);
    assert_eq!(merged.total_price, dec("49.95"));

    let keys: HashSet<(i64, i64)> = lines.iter().map(|l| (l.order_id, l.product_id)).collect();
    assert_eq!(keys.len(), lines.len());
}

#[test]
fn test_loaded_lines_reference_loaded_parents() {
    let fixture = Fixture::new();
    let mut store = MemoryWarehouse::new();
    Pipeline::new(fixture.config())
        .unwrap()
        .run(&mut store)
        .unwrap();

    let orders: Vec<Order> = store.rows(Table::Orders).unwrap();
    let products: Vec<Product> = store.rows(Table::Products).unwrap();
    let customers: Vec<Customer> = store.rows(Table::Customers).unwrap();
    let lines: Vec<OrderLine> = store.rows(Table::OrderDetails).unwrap();

    let order_ids: HashSet<i64> = orders.iter().map(|o| o.order_id).collect();
    let product_ids: HashSet<i64> = products.iter().map(|p| p.product_id).collect();
    let customer_ids: HashSet<i64> = customers.iter().map(|c| c.customer_id).collect();

    assert!(lines
        .iter()
        .all(|l| order_ids.contains(&l.order_id) && product_ids.contains(&l.product_id)));
    assert!(orders.iter().all(|o| customer_ids.contains(&o.customer_id)));
}

#[test]
fn test_load_order_is_children_first_then_parents_first() {
    let fixture = Fixture::new();
    let mut store = MemoryWarehouse::new();
    Pipeline::new(fixture.config())
        .unwrap()
        .run(&mut store)
        .unwrap();

    let deletes: Vec<Table> = store
        .operations()
        .iter()
        .filter_map(|op| match op {
            Operation::Delete(t) => Some(*t),
            _ => None,
        })
        .collect();
    assert_eq!(
        deletes,
        vec![Table::OrderDetails, Table::Orders, Table::Products, Table::Customers]
    );

    let mut inserted_tables: Vec<Table> = Vec::new();
    for op in store.operations() {
        if let Operation::Insert { table, .. } = op {
            if inserted_tables.last() != Some(table) {
                inserted_tables.push(*table);
            }
        }
    }
    assert_eq!(
        inserted_tables,
        vec![Table::Customers, Table::Products, Table::Orders, Table::OrderDetails]
    );
}

#[test]
fn test_large_extract_is_inserted_in_bounded_batches() {
    let fixture = Fixture::new();
    let mut orders = String::from("OrderID,CustomerID,OrderDate\n");
    let mut details = String::from("OrderID,ProductID,Quantity,TotalPrice\n");
    for id in 0..25_000 {
        writeln!(orders, "{},1,2024-01-01", id).unwrap();
        writeln!(details, "{},5,1,9.99", id).unwrap();
    }
    fixture.write("orders.csv", &orders);
    fixture.write("order_details.csv", &details);

    let mut store = MemoryWarehouse::new();
    let report = Pipeline::new(fixture.config())
        .unwrap()
        .run(&mut store)
        .unwrap();

    assert_eq!(
        store.insert_batches(Table::OrderDetails),
        vec![10_000, 10_000, 5_000]
    );
    assert_eq!(report.load.batches(Table::OrderDetails), 3);
    assert_eq!(store.count(Table::OrderDetails).unwrap(), 25_000);
}

#[test]
fn test_rerun_does_not_duplicate_rows() {
    let fixture = Fixture::new();
    let pipeline = Pipeline::new(fixture.config()).unwrap();
    let mut store = MemoryWarehouse::new();

    let first = pipeline.run(&mut store).unwrap();
    let before: Vec<OrderLine> = store.rows(Table::OrderDetails).unwrap();
    let second = pipeline.run(&mut store).unwrap();
    let after: Vec<OrderLine> = store.rows(Table::OrderDetails).unwrap();

    assert_ne!(first.run_id, second.run_id);
    assert!(second.validation.all_match());
    assert_eq!(before, after);
    for table in Table::ALL {
        assert_eq!(
            store.count(table).unwrap() as usize,
            second.summary.entity(table).unwrap().processed
        );
    }
}

#[test]
fn test_insert_failure_rolls_back_inserts() {
    let fixture = Fixture::new();
    let mut config = fixture.config();
    config.load.batch_size = 2;
    let mut store = MemoryWarehouse::new().fail_insert_at(Table::OrderDetails, 1);

    let err = Pipeline::new(config).unwrap().run(&mut store).unwrap_err();

    assert_eq!(err.phase(), Some(Phase::Insert));
    assert!(matches!(
        err,
        EtlError::Store {
            table: Table::OrderDetails,
            ..
        }
    ));
    for table in Table::ALL {
        assert_eq!(store.count(table).unwrap(), 0, "{} not rolled back", table);
    }
    assert_eq!(store.operations().last(), Some(&Operation::Rollback));
}

#[test]
fn test_single_transaction_keeps_previous_snapshot_on_failure() {
    let fixture = Fixture::new();
    let mut config = fixture.config();
    config.load.transaction_scope = TransactionScope::Single;
    // Batch 0 belongs to the first run, so the second run's only batch fails.
    let mut store = MemoryWarehouse::new().fail_insert_at(Table::OrderDetails, 1);
    let pipeline = Pipeline::new(config).unwrap();

    pipeline.run(&mut store).unwrap();
    let err = pipeline.run(&mut store).unwrap_err();

    assert_eq!(err.phase(), Some(Phase::Insert));
    assert_eq!(store.count(Table::Customers).unwrap(), 3);
    assert_eq!(store.count(Table::OrderDetails).unwrap(), 4);
    assert!(!store.in_transaction());
}

#[test]
fn test_malformed_identity_aborts_before_store_mutation() {
    let fixture = Fixture::new();
    fixture.write(
        "products.csv",
        "ProductID,ProductName,Category,Price\nfive,Widget,Hardware,9.99\n",
    );
    let mut store = MemoryWarehouse::new();

    let err = Pipeline::new(fixture.config())
        .unwrap()
        .run(&mut store)
        .unwrap_err();

    assert_eq!(err.phase(), Some(Phase::Normalize));
    assert!(err.to_string().contains("ProductID"));
    assert!(store.operations().is_empty());
}

#[test]
fn test_alternate_delimiter_and_extra_columns() {
    let fixture = Fixture::new();
    fixture.write(
        "customers.csv",
        "CustomerID;Name;Email;Phone;Region\n1;Ana;a@x;1;North\n2;Bo;;;South\n3;Cy;;;\n",
    );
    fixture.write(
        "products.csv",
        "ProductID;ProductName;Price\n5;Widget;9.99\n6;Gadget;24.50\n7;Doohickey;1.25\n",
    );
    fixture.write(
        "orders.csv",
        "OrderID;CustomerID;OrderDate\n100;1;2024-01-05\n101;2;\n102;3;01/31/2024\n",
    );
    fixture.write(
        "order_details.csv",
        "OrderID;ProductID;Quantity;TotalPrice\n100;5;2;19.98\n",
    );
    let mut config = fixture.config();
    config.source.delimiter = ';';

    let prepared = Pipeline::new(config).unwrap().prepare().unwrap();

    assert_eq!(prepared.snapshot.customers.len(), 3);
    assert!(prepared
        .snapshot
        .products
        .iter()
        .all(|p| p.category == "Unknown"));
    assert_eq!(prepared.summary.invalid_dates, 1);
}
