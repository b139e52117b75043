use crate::{expr::Body, BinaryOp, Expr, Pattern};

#[test]
fn body_allocates_and_looks_up_exprs() {
    let mut body = Body::default();
    let one = body.alloc_expr(Expr::Number(1.0));
    let two = body.alloc_expr(Expr::Number(2.0));
    let sum = body.alloc_expr(Expr::Binary { op: BinaryOp::Add, lhs: one, rhs: two });
    body.root = Some(sum);

    assert_eq!(body.expr(one), &Expr::Number(1.0));
    assert_eq!(body.expr(two), &Expr::Number(2.0));
    assert!(matches!(body.expr(sum), Expr::Binary { op: BinaryOp::Add, .. }));
}

#[test]
fn record_pattern_carries_field_names() {
    let mut body = Body::default();
    let name_pat = body.alloc_pat(Pattern::Variable("n".into()));
    let rec_pat = body.alloc_pat(Pattern::Record(vec![("name".into(), name_pat)]));
    match body.pattern(rec_pat) {
        Pattern::Record(fields) => {
            assert_eq!(fields.len(), 1);
            assert_eq!(fields[0].0.as_str(), "name");
        }
        _ => panic!("expected record pattern"),
    }
}
