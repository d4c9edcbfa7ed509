use shopcart_core::{
    Category, CategoryService, Includes, OrderDetail, OrderHeader, OrderService, OrderStatus,
    Product, Repository, ServiceError, SqliteUnitOfWork, UnitOfWork,
};

fn uow_with_order() -> SqliteUnitOfWork {
    let uow = SqliteUnitOfWork::open_in_memory().unwrap();
    uow.category().add(&Category::new("Books", 1)).unwrap();
    uow.save().unwrap();
    uow.product().add(&Product::new("Novel", 12.5, 1)).unwrap();
    uow.product().add(&Product::new("Atlas", 30.0, 1)).unwrap();
    uow.order_header()
        .add(&OrderHeader::new("User", 1_700_000_000_000))
        .unwrap();
    uow.save().unwrap();
    uow.order_detail()
        .add(&OrderDetail::new(1, 1, 2, 12.5))
        .unwrap();
    uow.order_detail()
        .add(&OrderDetail::new(1, 2, 1, 30.0))
        .unwrap();
    uow.save().unwrap();
    uow
}

#[test]
fn save_category_creates_then_updates() {
    let uow = SqliteUnitOfWork::open_in_memory().unwrap();
    let service = CategoryService::new(&uow);

    service.save_category(&Category::new("  Games ", 2)).unwrap();
    service.save_category(&Category::new("Books", 1)).unwrap();

    let listed = service.list_categories().unwrap();
    let names: Vec<&str> = listed.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Books", "Games"]);

    let mut games = service.find_by_name("Games").unwrap().unwrap();
    games.name = "Board games".to_string();
    games.display_order = 0;
    service.save_category(&games).unwrap();

    let stored = service.find_category(games.id).unwrap().unwrap();
    assert_eq!(stored.name, "Board games");
    assert_eq!(service.list_categories().unwrap()[0].id, games.id);
    assert!(!uow.has_changes());
}

#[test]
fn save_category_rejects_invalid_names() {
    let uow = SqliteUnitOfWork::open_in_memory().unwrap();
    let service = CategoryService::new(&uow);

    let blank = service.save_category(&Category::new("   ", 1)).unwrap_err();
    assert!(matches!(blank, ServiceError::Validation(_)));

    let long = service
        .save_category(&Category::new("x".repeat(101), 1))
        .unwrap_err();
    assert!(matches!(long, ServiceError::Validation(_)));
    assert!(service.list_categories().unwrap().is_empty());
}

#[test]
fn save_category_with_unknown_id_is_not_found() {
    let uow = SqliteUnitOfWork::open_in_memory().unwrap();
    let service = CategoryService::new(&uow);
    let ghost = Category {
        id: 9,
        name: "Ghost".to_string(),
        display_order: 0,
    };

    let err = service.save_category(&ghost).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::NotFound {
            entity: "category",
            id: 9
        }
    ));
}

#[test]
fn delete_category_removes_row_and_reports_missing_ids() {
    let uow = SqliteUnitOfWork::open_in_memory().unwrap();
    let service = CategoryService::new(&uow);
    service.save_category(&Category::new("A", 1)).unwrap();
    service.save_category(&Category::new("B", 2)).unwrap();

    service.delete_category(2).unwrap();
    assert!(service.find_category(2).unwrap().is_none());
    assert!(matches!(
        service.delete_category(2),
        Err(ServiceError::NotFound { id: 2, .. })
    ));
}

#[test]
fn delete_category_still_referenced_by_products_fails_cleanly() {
    let uow = uow_with_order();
    let service = CategoryService::new(&uow);

    let err = service.delete_category(1).unwrap_err();
    assert!(matches!(err, ServiceError::Repo(_)));
    assert!(service.find_category(1).unwrap().is_some());
}

#[test]
fn order_details_loads_lines_with_products() {
    let uow = uow_with_order();
    let service = OrderService::new(&uow);

    let view = service.order_details(1).unwrap();
    assert_eq!(view.header.name, "User");
    assert_eq!(view.lines.len(), 2);
    let products: Vec<&str> = view
        .lines
        .iter()
        .filter_map(|line| line.product.as_ref().map(|p| p.name.as_str()))
        .collect();
    assert_eq!(products, vec!["Novel", "Atlas"]);
    assert!((view.lines_total() - 55.0).abs() < f64::EPSILON);
}

#[test]
fn update_status_persists_new_state() {
    let uow = uow_with_order();
    let service = OrderService::new(&uow);

    service.update_status(1, OrderStatus::Shipped).unwrap();
    let header = uow
        .order_header()
        .get_all(None, Includes::none())
        .unwrap()
        .remove(0);
    assert_eq!(header.order_status, OrderStatus::Shipped);

    service.update_status(1, OrderStatus::Shipped).unwrap();
    assert!(!uow.has_changes());
}

#[test]
fn delete_order_removes_header_and_lines_together() {
    let uow = uow_with_order();
    let service = OrderService::new(&uow);

    service.delete_order(1).unwrap();
    assert!(uow
        .order_header()
        .get_all(None, Includes::none())
        .unwrap()
        .is_empty());
    assert!(uow
        .order_detail()
        .get_all(None, Includes::none())
        .unwrap()
        .is_empty());
    assert_eq!(uow.product().get_all(None, Includes::none()).unwrap().len(), 2);
}

#[test]
fn order_operations_on_missing_order_are_not_found() {
    let uow = uow_with_order();
    let service = OrderService::new(&uow);

    assert!(matches!(
        service.order_details(42),
        Err(ServiceError::NotFound {
            entity: "order",
            id: 42
        })
    ));
    assert!(matches!(
        service.update_status(42, OrderStatus::Cancelled),
        Err(ServiceError::NotFound { .. })
    ));
    assert!(matches!(
        service.delete_order(42),
        Err(ServiceError::NotFound { .. })
    ));
}
