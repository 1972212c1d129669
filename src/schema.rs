// Column names follow the extract headers so the warehouse reads the same as the source files.

diesel::table! {
    customers (customer_id) {
        #[sql_name = "CustomerID"]
        customer_id -> BigInt,
        #[sql_name = "Name"]
        name -> Nullable<Text>,
        #[sql_name = "Email"]
        email -> Text,
        #[sql_name = "Phone"]
        phone -> Text,
    }
}

diesel::table! {
    products (product_id) {
        #[sql_name = "ProductID"]
        product_id -> BigInt,
        #[sql_name = "ProductName"]
        product_name -> Nullable<Text>,
        #[sql_name = "Category"]
        category -> Text,
        #[sql_name = "Price"]
        price -> Nullable<Numeric>,
    }
}

diesel::table! {
    orders (order_id) {
        #[sql_name = "OrderID"]
        order_id -> BigInt,
        #[sql_name = "CustomerID"]
        customer_id -> BigInt,
        #[sql_name = "OrderDate"]
        order_date -> Nullable<Timestamp>,
    }
}

diesel::table! {
    order_details (order_id, product_id) {
        #[sql_name = "OrderID"]
        order_id -> BigInt,
        #[sql_name = "ProductID"]
        product_id -> BigInt,
        #[sql_name = "Quantity"]
        quantity -> BigInt,
        #[sql_name = "TotalPrice"]
        total_price -> Numeric,
    }
}

diesel::joinable!(orders -> customers (customer_id));
diesel::joinable!(order_details -> orders (order_id));
diesel::joinable!(order_details -> products (product_id));

diesel::allow_tables_to_appear_in_same_query!(customers, order_details, orders, products,);
