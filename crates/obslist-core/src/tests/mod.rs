mod observable_vec_tests;
