mod support;
mod test_operator_change;
