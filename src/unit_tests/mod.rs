mod compressed_matrix;
