use std::{cell::RefCell, rc::Rc, str::from_utf8};

use bank_ledger::{
    bin_utils::{Service, ServiceError},
    config::BankConfig,
    coordinator::ErrorKind,
};

const TEST_FILE: &str = include_str!("operations.csv");

#[test]
fn process_operations() {
    let errors = Rc::new(RefCell::new(Vec::new()));
    let mut output = Vec::new();
    let service = Service {
        input: TEST_FILE.as_bytes(),
        output: &mut output,
        config: BankConfig::default(),
        error_printer: Box::new({
            let errors = Rc::clone(&errors);
            move |_line, err| {
                let kind = match &err {
                    ServiceError::Bank(err) => format!("{:?}", err.kind()),
                    ServiceError::Auth(_) => "Auth".to_owned(),
                    ServiceError::Malformed(_) => "Malformed".to_owned(),
                };
                errors.borrow_mut().push(kind);
            }
        }),
    };
    service.run().unwrap();

    // accounts are printed in id order
    let lines: Vec<&str> = from_utf8(&output).unwrap().lines().collect();
    assert_eq!(
        lines,
        [
            "account,name,balance,unread",
            "jane@test.com,Jane Roe,2799.75,1",
            "user@test.com,John Doe,3050.25,0",
        ]
    );

    assert_eq!(
        *errors.borrow(),
        [
            format!("{:?}", ErrorKind::Validation),
            format!("{:?}", ErrorKind::NotFound),
            format!("{:?}", ErrorKind::InsufficientFunds),
            "Auth".to_owned(),
        ]
    );
}

#[test]
fn malformed_rows_are_reported_and_skipped() {
    let input = "\
op,account,counterparty,amount,secret
open,a@test.com,A,10,pw
refund,a@test.com,,5,
transfer,a@test.com,,5,
paybill,a@test.com,Water,,
";
    let errors = Rc::new(RefCell::new(Vec::new()));
    let mut output = Vec::new();
    let service = Service {
        input: input.as_bytes(),
        output: &mut output,
        config: BankConfig::default(),
        error_printer: Box::new({
            let errors = Rc::clone(&errors);
            move |_line, err| errors.borrow_mut().push(err.to_string())
        }),
    };
    service.run().unwrap();

    assert_eq!(errors.borrow().len(), 3);
    assert!(errors.borrow().iter().all(|err| err.starts_with("Malformed row")));
    assert_eq!(
        from_utf8(&output).unwrap().lines().nth(1),
        Some("a@test.com,A,10.00,0")
    );
}
