//! Ordering and equality of BSON values, the way query operators see them.

use std::cmp::Ordering;

use bson::Bson;

/// Numeric view of a BSON value. Int32, Int64 and Double compare as one type.
const fn as_number(value: &Bson) -> Option<f64> {
    match *value {
        Bson::Int32(n) => Some(n as f64),
        Bson::Int64(n) => Some(n as f64),
        Bson::Double(n) => Some(n),
        _ => None,
    }
}

/// Compares two BSON values for range operators (`$gt`, `$lte`, ...).
///
/// Returns `None` when the values belong to different type brackets, in which
/// case no range operator matches.
pub fn compare_values(a: &Bson, b: &Bson) -> Option<Ordering> {
    if let (Some(na), Some(nb)) = (as_number(a), as_number(b)) {
        return na.partial_cmp(&nb);
    }

    match (a, b) {
        (&Bson::String(ref sa), &Bson::String(ref sb)) => Some(sa.cmp(sb)),
        (&Bson::Boolean(ba), &Bson::Boolean(bb)) => Some(ba.cmp(&bb)),
        (&Bson::DateTime(da), &Bson::DateTime(db)) => Some(da.cmp(&db)),
        (&Bson::ObjectId(oa), &Bson::ObjectId(ob)) => Some(oa.cmp(&ob)),
        (&Bson::Null, &Bson::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

/// Equality used by implicit `{field: value}` matches and `$eq`.
///
/// Numbers compare by value across Int32, Int64 and Double at any depth.
/// Embedded documents must hold the same fields in the same order and arrays
/// the same elements in the same order.
pub fn values_equal(a: &Bson, b: &Bson) -> bool {
    if let (Some(na), Some(nb)) = (as_number(a), as_number(b)) {
        return na.partial_cmp(&nb) == Some(Ordering::Equal);
    }

    match (a, b) {
        (&Bson::Document(ref da), &Bson::Document(ref db)) => {
            da.len() == db.len() &&
                da.iter()
                    .zip(db.iter())
                    .all(|((ka, va), (kb, vb))| ka == kb && values_equal(va, vb))
        },
        (&Bson::Array(ref xa), &Bson::Array(ref xb)) => {
            xa.len() == xb.len() && xa.iter().zip(xb.iter()).all(|(va, vb)| values_equal(va, vb))
        },
        _ => a == b,
    }
}
